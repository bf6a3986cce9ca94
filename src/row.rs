//! Buffered result rows.
//!
//! A [`Row`] is an ordered list of `(column, value)` pairs copied out of the
//! connection capability. Results are buffered rather than cursor-backed,
//! so a mapped result set stays usable after its session releases the
//! underlying connection. Column lookup is case-insensitive.

use crate::error::DbError;
use crate::value::{FromValue, Value};

/// One buffered result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Raw value of a column, matched case-insensitively. `None` when the
    /// column is not present in the row at all (distinct from SQL NULL).
    pub fn get_raw(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    /// Typed value of a column, applying the coercion table.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Mapping` naming the column when it is absent from
    /// the row or when the conversion is impossible.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, DbError> {
        let value = self.get_raw(column).ok_or_else(|| {
            DbError::Mapping(format!("column '{column}' not present in result row"))
        })?;
        T::from_value(value)
            .map_err(|e| DbError::Mapping(format!("column '{column}': {e}")))
    }

    /// Columns in result order.
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(vec![
            ("id".to_string(), Value::BigInt(7)),
            ("Name".to_string(), Value::Text("Ada".to_string())),
            ("score".to_string(), Value::Null),
        ])
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let row = sample();
        assert_eq!(row.get_raw("NAME"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(row.get_raw("name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(row.get_raw("missing"), None);
    }

    #[test]
    fn test_typed_get() {
        let row = sample();
        assert_eq!(row.get::<i64>("id").unwrap(), 7);
        assert_eq!(row.get::<String>("name").unwrap(), "Ada");
        assert_eq!(row.get::<Option<i32>>("score").unwrap(), None);
    }

    #[test]
    fn test_missing_column_names_the_column() {
        let row = sample();
        let err = row.get::<i64>("absent").unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_bad_conversion_names_the_column() {
        let row = sample();
        let err = row.get::<i64>("name").unwrap_err();
        assert!(err.to_string().contains("name"));
        assert!(matches!(err, DbError::Mapping(_)));
    }
}
