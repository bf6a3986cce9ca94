//! Validated, immutable entity descriptors.

use crate::entity::meta::{ColumnType, TableMeta};
use crate::entity::naming::NamingStrategy;
use crate::error::DbError;

/// One field-to-column binding inside an [`EntityDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub field: String,
    pub column: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub generated: bool,
    pub char_padded: bool,
}

/// Static mapping of a record type to its table and columns.
///
/// Immutable once built; descriptors are shared behind `Arc` from the
/// registry cache and are safe for unsynchronized concurrent reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    table: String,
    type_name: String,
    columns: Vec<ColumnBinding>,
    primary_key: Vec<String>,
    version_column: Option<String>,
    soft_delete_column: Option<String>,
}

impl EntityDescriptor {
    /// Build and validate a descriptor from declarative metadata.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Mapping` when the metadata is unusable: zero
    /// persistent fields, two fields mapping to the same column, more than
    /// one version or soft-delete column, a non-integral version column,
    /// or a non-boolean soft-delete column.
    pub fn from_meta(meta: &TableMeta, naming: &NamingStrategy) -> Result<Self, DbError> {
        if meta.columns.is_empty() {
            return Err(DbError::Mapping(format!(
                "type '{}' declares no persistent fields",
                meta.type_name
            )));
        }

        let table = meta
            .table
            .map(str::to_string)
            .unwrap_or_else(|| naming.table_name(meta.type_name));

        let mut columns = Vec::with_capacity(meta.columns.len());
        let mut primary_key = Vec::new();
        let mut version_column = None;
        let mut soft_delete_column = None;

        for col in &meta.columns {
            let column = col
                .column
                .map(str::to_string)
                .unwrap_or_else(|| naming.column_name(col.field));

            if columns
                .iter()
                .any(|b: &ColumnBinding| b.column.eq_ignore_ascii_case(&column))
            {
                return Err(DbError::Mapping(format!(
                    "type '{}': two fields map to column '{}'",
                    meta.type_name, column
                )));
            }

            if col.version {
                if !col.ty.is_integral() {
                    return Err(DbError::Mapping(format!(
                        "type '{}': version column '{}' must be an integer type",
                        meta.type_name, column
                    )));
                }
                if version_column.replace(column.clone()).is_some() {
                    return Err(DbError::Mapping(format!(
                        "type '{}' declares more than one version column",
                        meta.type_name
                    )));
                }
            }
            if col.soft_delete {
                if col.ty != ColumnType::Boolean {
                    return Err(DbError::Mapping(format!(
                        "type '{}': soft-delete column '{}' must be boolean",
                        meta.type_name, column
                    )));
                }
                if soft_delete_column.replace(column.clone()).is_some() {
                    return Err(DbError::Mapping(format!(
                        "type '{}' declares more than one soft-delete column",
                        meta.type_name
                    )));
                }
            }
            if col.primary_key {
                primary_key.push(column.clone());
            }

            columns.push(ColumnBinding {
                field: col.field.to_string(),
                column,
                ty: col.ty,
                nullable: col.nullable,
                primary_key: col.primary_key,
                generated: col.generated,
                char_padded: col.char_padded,
            });
        }

        Ok(Self {
            table,
            type_name: meta.type_name.to_string(),
            columns,
            primary_key,
            version_column,
            soft_delete_column,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// All bindings, in declaration order.
    pub fn columns(&self) -> &[ColumnBinding] {
        &self.columns
    }

    /// Binding for a column name, matched case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnBinding> {
        self.columns
            .iter()
            .find(|b| b.column.eq_ignore_ascii_case(name))
    }

    /// Binding referenced by a condition or ordering key: matched against
    /// column names first, then field names, both case-insensitively.
    pub fn resolve_column(&self, name: &str) -> Option<&ColumnBinding> {
        self.column(name).or_else(|| {
            self.columns
                .iter()
                .find(|b| b.field.eq_ignore_ascii_case(name))
        })
    }

    /// Primary-key column names, possibly empty for read-only projections.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn version_column(&self) -> Option<&str> {
        self.version_column.as_deref()
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    /// Bindings included in INSERT statements (everything not generated).
    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.columns.iter().filter(|b| !b.generated)
    }

    /// Bindings assignable in an UPDATE SET list: not primary key, not
    /// generated, and not the version column (which is bumped separately).
    pub fn update_columns(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.columns.iter().filter(move |b| {
            !b.primary_key
                && !b.generated
                && self.version_column.as_deref() != Some(b.column.as_str())
        })
    }

    /// Fails unless the descriptor has at least one primary-key column.
    /// Required before building UPDATE or DELETE by entity.
    pub(crate) fn require_primary_key(&self) -> Result<(), DbError> {
        if self.primary_key.is_empty() {
            return Err(DbError::Mapping(format!(
                "type '{}' has no primary key; update and delete by entity are not possible",
                self.type_name
            )));
        }
        Ok(())
    }
}
