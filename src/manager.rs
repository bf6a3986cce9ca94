//! The fluent entry point.
//!
//! [`DbManager`] is cheap to clone and safe to share; every clone points at
//! the same pool, descriptor registry, and configuration. Terminal
//! operations either run on a caller-provided [`Session`] (`*_in`
//! variants) or open a one-shot transaction of their own, committing on
//! success and rolling back on any error. Reads get the same treatment,
//! since statements are only valid inside an active transaction.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::{BatchErrorPolicy, ManagerConfig};
use crate::connection::ConnectionPool;
use crate::entity::registry::DescriptorRegistry;
use crate::entity::traits::Record;
use crate::error::DbError;
use crate::mapper;
use crate::row::Row;
use crate::session::Session;
use crate::sql::builder::{BuiltBatch, EntityRow, SqlBuilder};
use crate::sql::condition::{col, Condition};
use crate::sql::spec::{Order, QuerySpec};
use crate::value::{IntoValue, Value};

/// Outcome of a single-entity insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub rows_affected: u64,
    /// Key the server produced for a generated primary key column.
    pub generated_key: Option<Value>,
}

/// Outcome of a batch operation under the `CollectErrors` policy.
///
/// `rows_affected` sums the successful sets; `failures` pairs each failed
/// set's index with its error. Under `FailFast` a batch either succeeds
/// wholesale or returns the first error directly.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub rows_affected: u64,
    pub failures: Vec<(usize, DbError)>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

struct ManagerInner {
    pool: Arc<dyn ConnectionPool>,
    registry: DescriptorRegistry,
    config: ManagerConfig,
    builder: SqlBuilder,
}

/// Session-scoped, fluent access to entities.
#[derive(Clone)]
pub struct DbManager {
    inner: Arc<ManagerInner>,
}

impl DbManager {
    pub fn new(pool: Arc<dyn ConnectionPool>, config: ManagerConfig) -> Self {
        let builder = SqlBuilder::new(config.dialect);
        let registry = DescriptorRegistry::new(config.naming);
        Self {
            inner: Arc::new(ManagerInner {
                pool,
                registry,
                config,
                builder,
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.inner.registry
    }

    /// Opens a session the caller drives explicitly.
    pub fn session(&self) -> Result<Session, DbError> {
        Session::open(
            &self.inner.pool,
            self.inner.config.acquire_timeout(),
            self.inner.config.statement_timeout(),
        )
    }

    /// Runs `f` inside one transaction: commit when it returns `Ok`,
    /// rollback when it returns `Err` or when any statement failed.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut session = self.session()?;
        session.begin()?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                session.close();
                Ok(value)
            }
            Err(e) => {
                if session.in_transaction() {
                    if let Err(rb) = session.rollback() {
                        log::warn!("rollback after failed transaction body failed: {rb}");
                    }
                }
                session.close();
                Err(e)
            }
        }
    }

    /// Starts a fluent query over `R`'s table.
    pub fn from<R: Record>(&self) -> EntityQuery<R> {
        EntityQuery {
            manager: self.clone(),
            spec: QuerySpec::new(),
            sets: Vec::new(),
            allow_all: false,
            _entity: PhantomData,
        }
    }

    /// All live rows of `R`'s table, capped by the default fetch size.
    pub fn find_all<R: Record>(&self) -> Result<Vec<R>, DbError> {
        self.from::<R>().find()
    }

    /// Looks up one entity by its single-column primary key.
    ///
    /// # Errors
    ///
    /// `DbError::Mapping` when the entity has a composite primary key.
    pub fn find_by_pk<R: Record>(&self, pk: impl IntoValue) -> Result<Option<R>, DbError> {
        self.transaction(|session| self.find_by_pk_in(session, pk))
    }

    pub fn find_by_pk_in<R: Record>(
        &self,
        session: &mut Session,
        pk: impl IntoValue,
    ) -> Result<Option<R>, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let pk_column = match desc.primary_key() {
            [single] => single.clone(),
            other => {
                return Err(DbError::Mapping(format!(
                    "table '{}' has {} primary key columns, find_by_pk needs exactly one",
                    desc.table(),
                    other.len()
                )))
            }
        };
        let spec = QuerySpec::new().filter(col(pk_column).eq(pk));
        let built = self.inner.builder.select(&desc, &spec)?;
        let rows = session.query(&built.sql, &built.params)?;
        mapper::expect_optional(&desc, &rows)
    }

    /// Inserts one entity in its own transaction.
    pub fn insert<R: Record>(&self, entity: &R) -> Result<InsertResult, DbError> {
        self.transaction(|session| self.insert_in(session, entity))
    }

    pub fn insert_in<R: Record>(
        &self,
        session: &mut Session,
        entity: &R,
    ) -> Result<InsertResult, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let values = insert_values(&desc, entity)?;
        let built = self.inner.builder.insert(&desc, &values)?;
        let outcome = session.execute(&built.sql, &built.params)?;
        Ok(InsertResult {
            rows_affected: outcome.rows_affected,
            generated_key: outcome.generated_key,
        })
    }

    /// Updates one entity by primary key in its own transaction.
    ///
    /// # Errors
    ///
    /// `DbError::OptimisticLock` when the entity declares a version column
    /// and the row no longer carries the expected version;
    /// `DbError::NotFound` when an unversioned entity matches no row.
    pub fn update<R: Record>(&self, entity: &R) -> Result<u64, DbError> {
        self.transaction(|session| self.update_in(session, entity))
    }

    pub fn update_in<R: Record>(
        &self,
        session: &mut Session,
        entity: &R,
    ) -> Result<u64, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let row = entity_row(&desc, entity)?;
        let built = self.inner.builder.update_entity(&desc, &row)?;
        let outcome = session.execute(&built.sql, &built.params)?;
        self.check_pk_mutation(&desc, &row, outcome.rows_affected)?;
        Ok(outcome.rows_affected)
    }

    /// Deletes one entity by primary key in its own transaction, with the
    /// same version-conflict semantics as [`DbManager::update`]. Entities
    /// with a soft-delete column are flagged instead of removed.
    pub fn delete<R: Record>(&self, entity: &R) -> Result<u64, DbError> {
        self.transaction(|session| self.delete_in(session, entity))
    }

    pub fn delete_in<R: Record>(
        &self,
        session: &mut Session,
        entity: &R,
    ) -> Result<u64, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let row = entity_row(&desc, entity)?;
        let built = self.inner.builder.delete_entity(&desc, &row)?;
        let outcome = session.execute(&built.sql, &built.params)?;
        self.check_pk_mutation(&desc, &row, outcome.rows_affected)?;
        Ok(outcome.rows_affected)
    }

    /// Inserts many entities. Under `FailFast` the whole batch runs as one
    /// prepared statement in one transaction and the first error aborts it;
    /// under `CollectErrors` each entity gets its own transaction and
    /// failures are gathered per index.
    pub fn batch_insert<R: Record>(&self, entities: &[R]) -> Result<BatchOutcome, DbError> {
        match self.inner.config.batch_error_policy {
            BatchErrorPolicy::FailFast => {
                self.transaction(|session| self.batch_insert_in(session, entities))
            }
            BatchErrorPolicy::CollectErrors => {
                Ok(self.collect_batch(entities, |e| self.insert(e).map(|r| r.rows_affected)))
            }
        }
    }

    /// Batch insert on the caller's session: one prepared statement, first
    /// error aborts, regardless of the configured policy.
    pub fn batch_insert_in<R: Record>(
        &self,
        session: &mut Session,
        entities: &[R],
    ) -> Result<BatchOutcome, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let mut rows = Vec::with_capacity(entities.len());
        for entity in entities {
            rows.push(insert_values(&desc, entity)?);
        }
        let batch = self.inner.builder.insert_batch(&desc, &rows)?;
        self.run_batch(session, &batch)
    }

    /// Updates many entities by primary key, with the same policy split as
    /// [`DbManager::batch_insert`]. Version conflicts surface per index
    /// under `CollectErrors`; under `FailFast` a stale row only shows up as
    /// a missing count, since the driver reports no error for it.
    pub fn batch_update<R: Record>(&self, entities: &[R]) -> Result<BatchOutcome, DbError> {
        match self.inner.config.batch_error_policy {
            BatchErrorPolicy::FailFast => {
                self.transaction(|session| self.batch_update_in(session, entities))
            }
            BatchErrorPolicy::CollectErrors => Ok(self.collect_batch(entities, |e| self.update(e))),
        }
    }

    pub fn batch_update_in<R: Record>(
        &self,
        session: &mut Session,
        entities: &[R],
    ) -> Result<BatchOutcome, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let mut rows = Vec::with_capacity(entities.len());
        for entity in entities {
            rows.push(entity_row(&desc, entity)?);
        }
        let batch = self.inner.builder.update_batch(&desc, &rows)?;
        self.run_batch(session, &batch)
    }

    pub fn batch_delete<R: Record>(&self, entities: &[R]) -> Result<BatchOutcome, DbError> {
        match self.inner.config.batch_error_policy {
            BatchErrorPolicy::FailFast => {
                self.transaction(|session| self.batch_delete_in(session, entities))
            }
            BatchErrorPolicy::CollectErrors => Ok(self.collect_batch(entities, |e| self.delete(e))),
        }
    }

    pub fn batch_delete_in<R: Record>(
        &self,
        session: &mut Session,
        entities: &[R],
    ) -> Result<BatchOutcome, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let mut rows = Vec::with_capacity(entities.len());
        for entity in entities {
            rows.push(entity_row(&desc, entity)?);
        }
        let batch = self.inner.builder.delete_batch(&desc, &rows)?;
        self.run_batch(session, &batch)
    }

    /// Escape hatch: runs caller-written SQL with positional parameters.
    /// The text bypasses the builder, so identifier validation and the
    /// soft-delete guard do not apply.
    pub fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.transaction(|session| session.query(sql, params))
    }

    /// Raw SELECT mapped onto `R` through its descriptor. The statement
    /// must produce every column `R` declares.
    pub fn query_raw_as<R: Record>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<R>, DbError> {
        let desc = self.inner.registry.resolve::<R>()?;
        let rows = self.query_raw(sql, params)?;
        mapper::map_all(&desc, &rows)
    }

    pub fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        self.transaction(|session| Ok(session.execute(sql, params)?.rows_affected))
    }

    fn run_batch(
        &self,
        session: &mut Session,
        batch: &BuiltBatch,
    ) -> Result<BatchOutcome, DbError> {
        let outcomes = session.execute_batch(&batch.sql, &batch.param_sets)?;
        Ok(BatchOutcome {
            rows_affected: outcomes.iter().map(|o| o.rows_affected).sum(),
            failures: Vec::new(),
        })
    }

    // CollectErrors runs each entity in its own transaction, so one bad
    // entity cannot take the rest of the batch down with it.
    fn collect_batch<R>(
        &self,
        entities: &[R],
        mut op: impl FnMut(&R) -> Result<u64, DbError>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            rows_affected: 0,
            failures: Vec::new(),
        };
        for (index, entity) in entities.iter().enumerate() {
            match op(entity) {
                Ok(n) => outcome.rows_affected += n,
                Err(e) => outcome.failures.push((index, e)),
            }
        }
        outcome
    }

    fn check_pk_mutation(
        &self,
        desc: &crate::entity::descriptor::EntityDescriptor,
        row: &EntityRow,
        rows_affected: u64,
    ) -> Result<(), DbError> {
        if rows_affected > 0 {
            return Ok(());
        }
        if let Some(version) = desc.version_column() {
            let expected_version = row
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(version))
                .and_then(|(_, v)| v.as_i64())
                .unwrap_or(0);
            return Err(DbError::OptimisticLock {
                table: desc.table().to_string(),
                expected_version,
            });
        }
        Err(DbError::NotFound {
            table: desc.table().to_string(),
        })
    }

    /// Caps uncapped selects at the configured default fetch size. A spec
    /// that sets either limit or offset is taken as deliberate paging and
    /// left alone.
    fn effective_spec(&self, spec: QuerySpec) -> QuerySpec {
        if spec.has_paging() || self.inner.config.default_fetch_size == 0 {
            spec
        } else {
            spec.limit(self.inner.config.default_fetch_size)
        }
    }
}

/// A fluent query under construction. Built by [`DbManager::from`],
/// consumed by a terminal operation.
pub struct EntityQuery<R: Record> {
    manager: DbManager,
    spec: QuerySpec,
    sets: Vec<(String, Value)>,
    allow_all: bool,
    _entity: PhantomData<fn() -> R>,
}

impl<R: Record> EntityQuery<R> {
    /// Narrows the query; successive calls are AND-composed.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.spec = self.spec.filter(condition);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.spec = self.spec.order_by(column, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec = self.spec.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec = self.spec.offset(offset);
        self
    }

    /// Adds a SET assignment for [`EntityQuery::update_matching`].
    pub fn set(mut self, column: impl Into<String>, value: impl IntoValue) -> Self {
        self.sets.push((column.into(), value.into_value()));
        self
    }

    /// Opts in to an UPDATE or DELETE that affects every row.
    pub fn allow_unconditioned(mut self) -> Self {
        self.allow_all = true;
        self
    }

    /// Runs the SELECT and maps every row.
    pub fn find(self) -> Result<Vec<R>, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.find_in(session))
    }

    pub fn find_in(self, session: &mut Session) -> Result<Vec<R>, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let spec = self.manager.effective_spec(self.spec);
        let built = self.manager.inner.builder.select(&desc, &spec)?;
        let rows = session.query(&built.sql, &built.params)?;
        mapper::map_all(&desc, &rows)
    }

    /// Runs the SELECT expecting exactly one row.
    ///
    /// # Errors
    ///
    /// `DbError::NotFound` on zero rows, `DbError::TooManyResults` on
    /// more than one.
    pub fn find_one(self) -> Result<R, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.find_one_in(session))
    }

    pub fn find_one_in(self, session: &mut Session) -> Result<R, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let built = self.manager.inner.builder.select(&desc, &self.spec)?;
        let rows = session.query(&built.sql, &built.params)?;
        mapper::expect_one(&desc, &rows)
    }

    /// Runs the SELECT expecting at most one row.
    pub fn find_optional(self) -> Result<Option<R>, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.find_optional_in(session))
    }

    pub fn find_optional_in(self, session: &mut Session) -> Result<Option<R>, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let built = self.manager.inner.builder.select(&desc, &self.spec)?;
        let rows = session.query(&built.sql, &built.params)?;
        mapper::expect_optional(&desc, &rows)
    }

    /// Counts matching rows, ignoring ordering and paging.
    pub fn count(self) -> Result<u64, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.count_in(session))
    }

    pub fn count_in(self, session: &mut Session) -> Result<u64, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let built = self.manager.inner.builder.count(&desc, &self.spec)?;
        let rows = session.query(&built.sql, &built.params)?;
        let row = rows.first().ok_or_else(|| {
            DbError::Mapping(format!(
                "COUNT over table '{}' returned no row",
                desc.table()
            ))
        })?;
        row.columns()
            .first()
            .and_then(|(_, v)| v.as_i64())
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| {
                DbError::Mapping(format!(
                    "COUNT over table '{}' returned a non-integer",
                    desc.table()
                ))
            })
    }

    /// Applies the accumulated SET assignments to every matching row, in
    /// its own transaction.
    ///
    /// # Errors
    ///
    /// `DbError::UnsafeOperation` without a filter unless
    /// [`EntityQuery::allow_unconditioned`] was called, or when no SET
    /// assignment was added.
    pub fn update_matching(self) -> Result<u64, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.update_matching_in(session))
    }

    pub fn update_matching_in(self, session: &mut Session) -> Result<u64, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let built =
            self.manager
                .inner
                .builder
                .update_matching(&desc, &self.sets, &self.spec, self.allow_all)?;
        Ok(session.execute(&built.sql, &built.params)?.rows_affected)
    }

    /// Deletes every matching row, in its own transaction. Soft-delete
    /// entities are flagged instead of removed.
    pub fn delete_matching(self) -> Result<u64, DbError> {
        let manager = self.manager.clone();
        manager.transaction(|session| self.delete_matching_in(session))
    }

    pub fn delete_matching_in(self, session: &mut Session) -> Result<u64, DbError> {
        let desc = self.manager.inner.registry.resolve::<R>()?;
        let built =
            self.manager
                .inner
                .builder
                .delete_matching(&desc, &self.spec, self.allow_all)?;
        Ok(session.execute(&built.sql, &built.params)?.rows_affected)
    }
}

fn entity_row<R: Record>(
    desc: &crate::entity::descriptor::EntityDescriptor,
    entity: &R,
) -> Result<EntityRow, DbError> {
    let mut row = Vec::with_capacity(desc.columns().len());
    for binding in desc.columns() {
        let value = entity.get(&binding.field).ok_or_else(|| {
            DbError::Mapping(format!(
                "entity '{}' returned no value for field '{}'",
                desc.type_name(),
                binding.field
            ))
        })?;
        row.push((binding.column.clone(), value));
    }
    Ok(row)
}

fn insert_values<R: Record>(
    desc: &crate::entity::descriptor::EntityDescriptor,
    entity: &R,
) -> Result<Vec<Value>, DbError> {
    let mut values = Vec::new();
    for binding in desc.insert_columns() {
        let value = entity.get(&binding.field).ok_or_else(|| {
            DbError::Mapping(format!(
                "entity '{}' returned no value for field '{}'",
                desc.type_name(),
                binding.field
            ))
        })?;
        values.push(value);
    }
    Ok(values)
}
