//! Transaction-scoped session over one pooled connection.
//!
//! A session owns exactly one connection for its whole lifetime, so every
//! statement issued through it sees the same transaction. The lifecycle is
//! a strict state machine:
//!
//! `NotStarted -> Active -> (Committed | RolledBack) -> Closed`
//!
//! Nested `begin` calls join the outer transaction by depth counting; only
//! the outermost `commit` or `rollback` reaches the server. `close` is
//! idempotent and rolls back any transaction still active.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::{ConnectionError, ConnectionHandle, ConnectionPool, ExecOutcome};
use crate::error::DbError;
use crate::row::Row;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
    Closed,
}

impl TxState {
    fn name(self) -> &'static str {
        match self {
            TxState::NotStarted => "not started",
            TxState::Active => "active",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled back",
            TxState::Closed => "closed",
        }
    }
}

/// A unit of work bound to one connection.
#[derive(Debug)]
pub struct Session {
    conn: Option<Box<dyn ConnectionHandle>>,
    state: TxState,
    depth: u32,
    statement_timeout: Option<Duration>,
}

impl Session {
    /// Acquires a connection from the pool and opens a session around it.
    ///
    /// # Errors
    ///
    /// Propagates the pool's acquire timeout as `DbError::Connection`.
    pub fn open(
        pool: &Arc<dyn ConnectionPool>,
        acquire_timeout: Duration,
        statement_timeout: Option<Duration>,
    ) -> Result<Self, DbError> {
        let conn = pool.acquire(acquire_timeout)?;
        Ok(Self {
            conn: Some(conn),
            state: TxState::NotStarted,
            depth: 0,
            statement_timeout,
        })
    }

    /// Starts a transaction, or joins the one already running.
    ///
    /// # Errors
    ///
    /// `DbError::SessionState` when the session already finished.
    pub fn begin(&mut self) -> Result<(), DbError> {
        match self.state {
            TxState::NotStarted => {
                self.conn_mut()?.begin()?;
                self.state = TxState::Active;
                self.depth = 1;
                log::debug!("transaction started");
                Ok(())
            }
            TxState::Active => {
                self.depth += 1;
                log::debug!("joined active transaction, depth {}", self.depth);
                Ok(())
            }
            finished => Err(self.state_error("begin", finished)),
        }
    }

    /// Commits the transaction. Inner joins only decrement the depth; the
    /// outermost call sends COMMIT.
    ///
    /// # Errors
    ///
    /// `DbError::SessionState` unless the session is active.
    pub fn commit(&mut self) -> Result<(), DbError> {
        match self.state {
            TxState::Active if self.depth > 1 => {
                self.depth -= 1;
                Ok(())
            }
            TxState::Active => {
                self.conn_mut()?.commit()?;
                self.state = TxState::Committed;
                self.depth = 0;
                log::debug!("transaction committed");
                Ok(())
            }
            other => Err(self.state_error("commit", other)),
        }
    }

    /// Rolls back the transaction. A rollback from any depth abandons the
    /// whole transaction; joined inner scopes cannot keep their work.
    ///
    /// # Errors
    ///
    /// `DbError::SessionState` unless the session is active.
    pub fn rollback(&mut self) -> Result<(), DbError> {
        match self.state {
            TxState::Active => {
                self.conn_mut()?.rollback()?;
                self.state = TxState::RolledBack;
                self.depth = 0;
                log::debug!("transaction rolled back");
                Ok(())
            }
            other => Err(self.state_error("rollback", other)),
        }
    }

    /// Runs a SELECT on this session's connection. Valid only while a
    /// transaction is active; a statement failure rolls the transaction
    /// back and closes the session before the error propagates.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.ensure_active("query")?;
        let deadline = self.deadline();
        log::debug!("query: {sql}");
        let result = {
            let conn = self.conn_mut()?;
            conn.prepare(sql)
                .and_then(|mut stmt| stmt.query(params, deadline))
        };
        self.finish_statement(result)
    }

    /// Runs a mutating statement, with the same state and failure rules as
    /// [`Session::query`].
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecOutcome, DbError> {
        self.ensure_active("execute")?;
        let deadline = self.deadline();
        log::debug!("execute: {sql}");
        let result = {
            let conn = self.conn_mut()?;
            conn.prepare(sql)
                .and_then(|mut stmt| stmt.execute(params, deadline))
        };
        self.finish_statement(result)
    }

    /// Runs one statement once per parameter set, preparing it a single
    /// time. Stops at the first failing set; the failure rolls back and
    /// closes like any other statement error.
    pub fn execute_batch(
        &mut self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> Result<Vec<ExecOutcome>, DbError> {
        self.ensure_active("execute")?;
        let deadline = self.deadline();
        log::debug!("batch execute ({} sets): {sql}", param_sets.len());
        let result = {
            let conn = self.conn_mut()?;
            conn.prepare(sql).and_then(|mut stmt| {
                let mut outcomes = Vec::with_capacity(param_sets.len());
                for params in param_sets {
                    outcomes.push(stmt.execute(params, deadline)?);
                }
                Ok(outcomes)
            })
        };
        self.finish_statement(result)
    }

    /// Whether a transaction is currently active.
    pub fn in_transaction(&self) -> bool {
        self.state == TxState::Active
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.state == TxState::Closed
    }

    /// Finishes the session and releases its connection. An active
    /// transaction is rolled back first. Calling close again is a no-op.
    pub fn close(&mut self) {
        if self.state == TxState::Closed {
            return;
        }
        if self.state == TxState::Active {
            if let Some(conn) = self.conn.as_mut() {
                if let Err(e) = conn.rollback() {
                    log::warn!("rollback during close failed: {e}");
                }
            }
            self.state = TxState::RolledBack;
            log::debug!("open transaction rolled back on close");
        }
        self.conn = None;
        self.depth = 0;
        self.state = TxState::Closed;
    }

    fn deadline(&self) -> Option<Instant> {
        self.statement_timeout.map(|t| Instant::now() + t)
    }

    fn ensure_active(&self, op: &str) -> Result<(), DbError> {
        match self.state {
            TxState::Active => Ok(()),
            other => Err(DbError::SessionState(format!(
                "cannot {op} outside a transaction, session is {}",
                other.name()
            ))),
        }
    }

    // Statement failures leave the connection in an unknown state, so the
    // transaction is abandoned and the session closed before the error
    // reaches the caller.
    fn finish_statement<T>(&mut self, result: Result<T, ConnectionError>) -> Result<T, DbError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("statement failed, rolling back session: {e}");
                self.close();
                Err(DbError::Connection(e))
            }
        }
    }

    fn state_error(&self, op: &str, state: TxState) -> DbError {
        DbError::SessionState(format!(
            "cannot {op}: transaction is {}",
            state.name()
        ))
    }

    fn conn_mut(&mut self) -> Result<&mut Box<dyn ConnectionHandle>, DbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::SessionState("session has no connection".to_string()))
    }
}

impl Drop for Session {
    // Last-resort cleanup; explicit close is the expected path.
    fn drop(&mut self) {
        if self.state == TxState::Active {
            log::warn!("session dropped with an active transaction, rolling back");
        }
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryDb;

    fn open_session(db: &MemoryDb) -> Session {
        Session::open(&db.pool(), Duration::from_secs(1), None).unwrap()
    }

    fn blank_db() -> MemoryDb {
        MemoryDb::new()
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let db = blank_db();
        let mut session = open_session(&db);
        assert!(!session.in_transaction());
        session.begin().unwrap();
        assert!(session.in_transaction());
        session.commit().unwrap();
        assert!(!session.in_transaction());
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_commit_without_begin_is_rejected() {
        let db = blank_db();
        let mut session = open_session(&db);
        let err = session.commit().unwrap_err();
        assert!(matches!(err, DbError::SessionState(_)));
        assert!(err.to_string().contains("not started"));
    }

    #[test]
    fn test_finished_transaction_rejects_further_control_calls() {
        let db = blank_db();
        let mut session = open_session(&db);
        session.begin().unwrap();
        session.commit().unwrap();
        assert!(matches!(
            session.begin().unwrap_err(),
            DbError::SessionState(_)
        ));
        assert!(matches!(
            session.rollback().unwrap_err(),
            DbError::SessionState(_)
        ));
    }

    #[test]
    fn test_nested_begin_joins_and_only_outer_commit_lands() {
        let db = blank_db();
        let mut session = open_session(&db);
        session.begin().unwrap();
        session.begin().unwrap();
        session.commit().unwrap();
        // Inner commit only decremented depth.
        assert!(session.in_transaction());
        session.commit().unwrap();
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_rollback_from_inner_depth_abandons_everything() {
        let db = blank_db();
        let mut session = open_session(&db);
        session.begin().unwrap();
        session.begin().unwrap();
        session.rollback().unwrap();
        assert!(!session.in_transaction());
        assert!(matches!(
            session.commit().unwrap_err(),
            DbError::SessionState(_)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let db = blank_db();
        let mut session = open_session(&db);
        session.close();
        session.close();
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_query_after_close_is_rejected() {
        let db = blank_db();
        let mut session = open_session(&db);
        session.close();
        let err = session.query("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, DbError::SessionState(_)));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_query_outside_transaction_is_rejected() {
        let db = blank_db();
        let mut session = open_session(&db);
        let err = session.query("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, DbError::SessionState(_)));
        assert!(err.to_string().contains("outside a transaction"));
    }

    #[test]
    fn test_statement_failure_rolls_back_and_closes() {
        let db = blank_db();
        db.set_statement_delay(Some(Duration::from_secs(5)));
        let mut session =
            Session::open(&db.pool(), Duration::from_secs(1), Some(Duration::from_millis(1)))
                .unwrap();
        session.begin().unwrap();
        let err = session.query("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
        assert!(session.is_closed());
        assert!(db.statements().iter().any(|s| s == "ROLLBACK"));
    }

    #[test]
    fn test_acquire_timeout_surfaces_as_connection_error() {
        let db = blank_db();
        db.set_exhausted(true);
        let err = Session::open(&db.pool(), Duration::from_millis(10), None).unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
    }
}
