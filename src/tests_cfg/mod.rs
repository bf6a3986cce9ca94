//! Shared fixture entities for unit tests.

use crate::config::ManagerConfig;
use crate::entity::meta::{ColumnMeta, ColumnType, TableMeta};
use crate::error::DbError;
use crate::manager::DbManager;
use crate::mock::MemoryDb;
use crate::row::Row;
use crate::value::Value;
use crate::Record;

/// Versioned entity with a generated key, for optimistic-lock scenarios.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub version: i64,
}

impl Record for Customer {
    fn schema() -> TableMeta {
        TableMeta::new("Customer")
            .column(
                ColumnMeta::new("id", ColumnType::BigInt)
                    .primary_key()
                    .generated(),
            )
            .column(ColumnMeta::new("name", ColumnType::Text))
            .column(ColumnMeta::new("version", ColumnType::BigInt).version())
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::BigInt(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "version" => Some(Value::BigInt(self.version)),
            _ => None,
        }
    }

    fn load(row: &Row) -> Result<Self, DbError> {
        Ok(Customer {
            id: row.get("id")?,
            name: row.get("name")?,
            version: row.get("version")?,
        })
    }
}

/// Soft-deleted entity without versioning.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub deleted: bool,
}

impl Record for Document {
    fn schema() -> TableMeta {
        TableMeta::new("Document")
            .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
            .column(ColumnMeta::new("title", ColumnType::Text))
            .column(ColumnMeta::new("deleted", ColumnType::Boolean).soft_delete())
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::BigInt(self.id)),
            "title" => Some(Value::Text(self.title.clone())),
            "deleted" => Some(Value::Bool(self.deleted)),
            _ => None,
        }
    }

    fn load(row: &Row) -> Result<Self, DbError> {
        Ok(Document {
            id: row.get("id")?,
            title: row.get("title")?,
            deleted: row.get("deleted")?,
        })
    }
}

/// Manager over a fresh in-memory store with the fixture tables created.
pub fn manager() -> (DbManager, MemoryDb) {
    let db = MemoryDb::new();
    db.create_table("customers", Some("id"));
    db.create_table("documents", None);
    let manager = DbManager::new(db.pool(), ManagerConfig::default());
    (manager, db)
}
