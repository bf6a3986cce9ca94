//! Naming strategy: field-to-column and type-to-table derivation.

use serde::Deserialize;

/// How field and type names map to column and table names when no explicit
/// override is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// CamelCase names become snake_case; table names are additionally
    /// pluralized (`Customer` becomes `customers`).
    #[default]
    SnakeCase,
    /// Names are used exactly as written; table names are still pluralized.
    Verbatim,
}

impl NamingStrategy {
    /// Column name for a record field.
    pub fn column_name(&self, field: &str) -> String {
        match self {
            NamingStrategy::SnakeCase => to_snake_case(field),
            NamingStrategy::Verbatim => field.to_string(),
        }
    }

    /// Table name derived from a type's simple name.
    pub fn table_name(&self, type_name: &str) -> String {
        let base = match self {
            NamingStrategy::SnakeCase => to_snake_case(type_name),
            NamingStrategy::Verbatim => type_name.to_string(),
        };
        pluralize(&base)
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

fn pluralize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        let before = stem.chars().last();
        if matches!(before, Some(c) if !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }
    if name.ends_with('s')
        || name.ends_with('x')
        || name.ends_with('z')
        || name.ends_with("ch")
        || name.ends_with("sh")
    {
        return format!("{name}es");
    }
    format!("{name}s")
}
