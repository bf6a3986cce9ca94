//! The `Record` trait: the capability a type implements to be persisted.

use crate::entity::meta::TableMeta;
use crate::error::DbError;
use crate::row::Row;
use crate::value::Value;

/// A plain data record that can be stored and loaded.
///
/// Implementations supply three things: a declarative schema, field access
/// by name for binding parameters, and construction from a mapped row.
/// A schema-derived code generator can emit these implementations, or they
/// can be written by hand.
///
/// # Example
///
/// ```
/// use fluentdb::entity::{ColumnMeta, ColumnType, Record, TableMeta};
/// use fluentdb::row::Row;
/// use fluentdb::value::{IntoValue, Value};
/// use fluentdb::error::DbError;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Customer {
///     id: i64,
///     name: String,
///     version: i64,
/// }
///
/// impl Record for Customer {
///     fn schema() -> TableMeta {
///         TableMeta::new("Customer")
///             .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key().generated())
///             .column(ColumnMeta::new("name", ColumnType::Text))
///             .column(ColumnMeta::new("version", ColumnType::BigInt).version())
///     }
///
///     fn get(&self, field: &str) -> Option<Value> {
///         match field {
///             "id" => Some(self.id.into_value()),
///             "name" => Some(self.name.clone().into_value()),
///             "version" => Some(self.version.into_value()),
///             _ => None,
///         }
///     }
///
///     fn load(row: &Row) -> Result<Self, DbError> {
///         Ok(Self {
///             id: row.get("id")?,
///             name: row.get("name")?,
///             version: row.get("version")?,
///         })
///     }
/// }
/// ```
pub trait Record: Clone + std::fmt::Debug + Sized + 'static {
    /// Declarative schema for this type. Called once per process; the
    /// result is validated and cached by the registry.
    fn schema() -> TableMeta;

    /// Value of a field, by field name. `None` for unknown fields.
    fn get(&self, field: &str) -> Option<Value>;

    /// Build an instance from a mapped result row. Columns in the row have
    /// already been normalized to their declared semantic types.
    fn load(row: &Row) -> Result<Self, DbError>;
}
