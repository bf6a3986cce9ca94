//! # fluentdb
//!
//! Session-scoped, fluent database access over declarative entity schemas.
//!
//! An entity implements [`Record`] to describe its table once; the manager
//! resolves that schema into a cached descriptor, builds parameterized SQL
//! through a dialect-aware builder, and maps result rows back with strict,
//! column-naming errors. Statements run on [`Session`]s that own one pooled
//! connection for their whole transaction.
//!
//! ```no_run
//! use fluentdb::{col, DbManager, ManagerConfig, Order};
//! use fluentdb::mock::MemoryDb;
//! # use fluentdb::{DbError, Record, Row, Value};
//! # use fluentdb::entity::meta::{ColumnMeta, ColumnType, TableMeta};
//! # #[derive(Debug, Clone)]
//! # struct Customer { id: i64, name: String, version: i64 }
//! # impl Record for Customer {
//! #     fn schema() -> TableMeta {
//! #         TableMeta::new("Customer")
//! #             .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key().generated())
//! #             .column(ColumnMeta::new("name", ColumnType::Text))
//! #             .column(ColumnMeta::new("version", ColumnType::BigInt).version())
//! #     }
//! #     fn get(&self, field: &str) -> Option<Value> {
//! #         match field {
//! #             "id" => Some(Value::BigInt(self.id)),
//! #             "name" => Some(Value::Text(self.name.clone())),
//! #             "version" => Some(Value::BigInt(self.version)),
//! #             _ => None,
//! #         }
//! #     }
//! #     fn load(row: &Row) -> Result<Self, DbError> {
//! #         Ok(Customer { id: row.get("id")?, name: row.get("name")?, version: row.get("version")? })
//! #     }
//! # }
//!
//! # fn main() -> Result<(), DbError> {
//! let db = MemoryDb::new();
//! db.create_table("customers", Some("id"));
//! let manager = DbManager::new(db.pool(), ManagerConfig::default());
//!
//! manager.insert(&Customer { id: 0, name: "Ada".into(), version: 0 })?;
//! let adults: Vec<Customer> = manager
//!     .from::<Customer>()
//!     .filter(col("name").like("A%"))
//!     .order_by("id", Order::Asc)
//!     .find()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod mock;
pub mod row;
pub mod session;
pub mod sql;
pub mod value;

#[cfg(test)]
mod tests_cfg;

pub use config::{BatchErrorPolicy, ManagerConfig};
pub use connection::{ConnectionError, ConnectionHandle, ConnectionPool, ExecOutcome, PreparedStatement};
pub use entity::naming::NamingStrategy;
pub use entity::traits::Record;
pub use error::DbError;
pub use manager::{BatchOutcome, DbManager, EntityQuery, InsertResult};
pub use row::Row;
pub use session::Session;
pub use sql::condition::{col, Condition};
pub use sql::dialect::Dialect;
pub use sql::spec::{Order, QuerySpec};
pub use value::{FromValue, IntoValue, Value};
