//! Connection capability traits.
//!
//! The session and manager layers talk to a database only through these
//! traits. A driver binding implements them for a real server; the
//! in-memory backend in [`crate::mock`] implements them for tests.

use std::fmt;
use std::time::{Duration, Instant};

use crate::row::Row;
use crate::value::Value;

/// Failures raised by the connection layer itself, as opposed to mapping
/// or session-protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// No connection became available within the acquire timeout.
    AcquireTimeout(Duration),
    /// A statement ran past its deadline.
    DeadlineExceeded,
    /// The server rejected or failed a statement.
    Statement(String),
    /// The pool or the handle was already closed.
    Closed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::AcquireTimeout(timeout) => {
                write!(f, "no connection available within {timeout:?}")
            }
            ConnectionError::DeadlineExceeded => {
                write!(f, "statement exceeded its deadline")
            }
            ConnectionError::Statement(msg) => write!(f, "statement failed: {msg}"),
            ConnectionError::Closed => write!(f, "connection is closed"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Result of a non-query statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutcome {
    /// Rows affected as reported by the server.
    pub rows_affected: u64,
    /// Key produced for a generated column, from a RETURNING clause or
    /// the server's last-insert-id mechanism, whichever the dialect uses.
    pub generated_key: Option<Value>,
}

/// Hands out connections, bounded by an acquire timeout.
pub trait ConnectionPool: Send + Sync {
    /// Blocks until a connection is free or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `ConnectionError::AcquireTimeout` when the pool stays exhausted,
    /// `ConnectionError::Closed` once the pool has shut down.
    fn acquire(&self, timeout: Duration) -> Result<Box<dyn ConnectionHandle>, ConnectionError>;
}

/// One checked-out connection. Dropping the handle returns it to its pool.
pub trait ConnectionHandle: Send {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>, ConnectionError>;

    fn begin(&mut self) -> Result<(), ConnectionError>;
    fn commit(&mut self) -> Result<(), ConnectionError>;
    fn rollback(&mut self) -> Result<(), ConnectionError>;
}

impl fmt::Debug for dyn ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionHandle")
    }
}

/// A statement prepared on one connection, executable with parameters.
///
/// The `deadline` carries the session's statement timeout; `None` means
/// unbounded. Implementations that cannot propagate a server-side timeout
/// check the deadline before running.
pub trait PreparedStatement {
    fn query(
        &mut self,
        params: &[Value],
        deadline: Option<Instant>,
    ) -> Result<Vec<Row>, ConnectionError>;

    fn execute(
        &mut self,
        params: &[Value],
        deadline: Option<Instant>,
    ) -> Result<ExecOutcome, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let e = ConnectionError::AcquireTimeout(Duration::from_secs(5));
        assert!(e.to_string().contains("5s"));
        assert_eq!(
            ConnectionError::Statement("boom".to_string()).to_string(),
            "statement failed: boom"
        );
        assert_eq!(ConnectionError::Closed.to_string(), "connection is closed");
    }

    #[test]
    fn test_exec_outcome_default() {
        let outcome = ExecOutcome::default();
        assert_eq!(outcome.rows_affected, 0);
        assert!(outcome.generated_key.is_none());
    }
}
