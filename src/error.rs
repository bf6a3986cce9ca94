use std::fmt;

use crate::connection::ConnectionError;

/// Errors produced by the access layer.
///
/// Every variant carries enough context to act on without the stack trace:
/// mapping failures name the column, lock conflicts name the table and the
/// version that was expected.
#[derive(Debug, Clone, PartialEq)]
pub enum DbError {
    /// A row or entity could not be converted, or an identifier did not
    /// resolve against the entity's descriptor.
    Mapping(String),
    /// A mutation was refused because it would affect every row without
    /// an explicit opt-in.
    UnsafeOperation(String),
    /// An operation was called in a transaction state that forbids it.
    SessionState(String),
    /// A versioned update or delete matched no row: the entity changed
    /// underneath the caller.
    OptimisticLock { table: String, expected_version: i64 },
    /// A single-result query matched nothing.
    NotFound { table: String },
    /// A single-result query matched more than one row.
    TooManyResults { table: String },
    /// The connection layer failed underneath the statement.
    Connection(ConnectionError),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Mapping(msg) => write!(f, "mapping error: {msg}"),
            DbError::UnsafeOperation(msg) => write!(f, "unsafe operation refused: {msg}"),
            DbError::SessionState(msg) => write!(f, "session state error: {msg}"),
            DbError::OptimisticLock {
                table,
                expected_version,
            } => write!(
                f,
                "optimistic lock conflict on table '{table}': expected version {expected_version}"
            ),
            DbError::NotFound { table } => {
                write!(f, "no row found in table '{table}'")
            }
            DbError::TooManyResults { table } => {
                write!(f, "more than one row found in table '{table}'")
            }
            DbError::Connection(e) => write!(f, "connection error: {e}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectionError> for DbError {
    fn from(e: ConnectionError) -> Self {
        DbError::Connection(e)
    }
}

impl DbError {
    /// Whether retrying the same call can ever succeed. Connection-level
    /// failures and lock conflicts are transient; the rest indicate a bug
    /// or a schema mismatch at the call site.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, DbError::Connection(_) | DbError::OptimisticLock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_names_the_table() {
        let e = DbError::OptimisticLock {
            table: "customers".to_string(),
            expected_version: 4,
        };
        assert_eq!(
            e.to_string(),
            "optimistic lock conflict on table 'customers': expected version 4"
        );
        let e = DbError::NotFound {
            table: "orders".to_string(),
        };
        assert!(e.to_string().contains("orders"));
    }

    #[test]
    fn test_connection_error_converts_and_chains() {
        let e: DbError = ConnectionError::AcquireTimeout(Duration::from_secs(1)).into();
        assert!(matches!(e, DbError::Connection(_)));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_permanence_classification() {
        assert!(DbError::Mapping("x".to_string()).is_permanent());
        assert!(DbError::UnsafeOperation("x".to_string()).is_permanent());
        assert!(!DbError::Connection(ConnectionError::Closed).is_permanent());
        assert!(!DbError::OptimisticLock {
            table: "t".to_string(),
            expected_version: 1,
        }
        .is_permanent());
    }
}
