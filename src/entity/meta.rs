//! Declarative schema metadata supplied by record types.
//!
//! `TableMeta` and `ColumnMeta` are plain data: a record type describes its
//! persistent fields once, and the registry validates and caches the
//! derived descriptor. No runtime reflection is involved.

/// Semantic type carried by a column binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInt,
    Decimal,
    Float,
    Double,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    TimestampTz,
    Uuid,
    Json,
}

impl ColumnType {
    /// Whether the type can hold a version counter.
    pub(crate) fn is_integral(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInt)
    }
}

/// Declarative description of one persistent field.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    /// Field name on the record type.
    pub field: &'static str,
    /// Explicit column name; when `None` the naming strategy derives one
    /// from the field name.
    pub column: Option<&'static str>,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Auto-generated by the database (identity/serial). Excluded from
    /// INSERT column lists; the generated key is read back instead.
    pub generated: bool,
    /// Optimistic-concurrency version counter.
    pub version: bool,
    /// Logical-delete flag column.
    pub soft_delete: bool,
    /// CHAR(n) semantics: trailing pad spaces are stripped on read.
    pub char_padded: bool,
}

impl ColumnMeta {
    pub fn new(field: &'static str, ty: ColumnType) -> Self {
        Self {
            field,
            column: None,
            ty,
            nullable: false,
            primary_key: false,
            generated: false,
            version: false,
            soft_delete: false,
            char_padded: false,
        }
    }

    pub fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn version(mut self) -> Self {
        self.version = true;
        self
    }

    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    pub fn char_padded(mut self) -> Self {
        self.char_padded = true;
        self
    }
}

/// Declarative description of a record type's table.
#[derive(Debug, Clone)]
pub struct TableMeta {
    /// Simple name of the record type; the table name is derived from it
    /// unless an explicit override is set.
    pub type_name: &'static str,
    /// Explicit table name override.
    pub table: Option<&'static str>,
    pub columns: Vec<ColumnMeta>,
}

impl TableMeta {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: None,
            columns: Vec::new(),
        }
    }

    pub fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }

    pub fn column(mut self, column: ColumnMeta) -> Self {
        self.columns.push(column);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let meta = ColumnMeta::new("id", ColumnType::BigInt);
        assert_eq!(meta.field, "id");
        assert!(!meta.nullable);
        assert!(!meta.primary_key);
        assert!(meta.column.is_none());
    }

    #[test]
    fn test_builder_flags_chain() {
        let meta = ColumnMeta::new("id", ColumnType::BigInt)
            .primary_key()
            .generated();
        assert!(meta.primary_key);
        assert!(meta.generated);

        let table = TableMeta::new("Customer")
            .table("customer_master")
            .column(meta);
        assert_eq!(table.table, Some("customer_master"));
        assert_eq!(table.columns.len(), 1);
    }

    #[test]
    fn test_integral_column_types() {
        assert!(ColumnType::Integer.is_integral());
        assert!(ColumnType::BigInt.is_integral());
        assert!(!ColumnType::Text.is_integral());
        assert!(!ColumnType::Decimal.is_integral());
    }
}
