//! SQL dialect flavors.
//!
//! A dialect decides placeholder syntax, identifier quoting, paging
//! syntax, and how generated keys come back from an INSERT.

use serde::Deserialize;
use std::fmt::Write;

/// Target SQL flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `$1`-style placeholders, double-quoted identifiers, `RETURNING`
    /// for generated keys.
    #[default]
    Postgres,
    /// `?` placeholders, backtick identifiers, generated keys reported by
    /// the driver on the execute outcome.
    MySql,
}

impl Dialect {
    /// Placeholder text for the `index`-th bound value (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Quote an identifier. Identifiers come from validated descriptors,
    /// but embedded quote characters are escaped regardless.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Paging clause, empty when neither limit nor offset is set.
    pub fn limit_offset(self, limit: Option<u64>, offset: Option<u64>) -> String {
        // Both flavors accept LIMIT/OFFSET; an offset without a limit
        // needs an explicit unbounded limit on MySQL.
        let mut clause = String::new();
        match (limit, offset) {
            (Some(l), Some(o)) => {
                let _ = write!(clause, " LIMIT {l} OFFSET {o}");
            }
            (Some(l), None) => {
                let _ = write!(clause, " LIMIT {l}");
            }
            (None, Some(o)) => match self {
                Dialect::Postgres => {
                    let _ = write!(clause, " OFFSET {o}");
                }
                Dialect::MySql => {
                    let _ = write!(clause, " LIMIT 18446744073709551615 OFFSET {o}");
                }
            },
            (None, None) => {}
        }
        clause
    }

    /// Whether INSERT can return generated keys through a RETURNING clause.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.placeholder(12), "$12");
        assert_eq!(Dialect::MySql.placeholder(1), "?");
        assert_eq!(Dialect::MySql.placeholder(12), "?");
    }

    #[test]
    fn test_quoting_escapes_embedded_quotes() {
        assert_eq!(Dialect::Postgres.quote("name"), "\"name\"");
        assert_eq!(Dialect::Postgres.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySql.quote("name"), "`name`");
    }

    #[test]
    fn test_limit_offset_variants() {
        assert_eq!(Dialect::Postgres.limit_offset(None, None), "");
        assert_eq!(Dialect::Postgres.limit_offset(Some(10), None), " LIMIT 10");
        assert_eq!(
            Dialect::Postgres.limit_offset(Some(10), Some(20)),
            " LIMIT 10 OFFSET 20"
        );
        assert_eq!(Dialect::Postgres.limit_offset(None, Some(20)), " OFFSET 20");
        assert!(Dialect::MySql
            .limit_offset(None, Some(20))
            .contains("18446744073709551615"));
    }

    #[test]
    fn test_returning_support() {
        assert!(Dialect::Postgres.supports_returning());
        assert!(!Dialect::MySql.supports_returning());
    }
}
