//! The dynamic SQL builder.
//!
//! Compiles a query spec plus entity descriptor into parameterized SQL.
//! Three rules hold for every statement built here:
//!
//! 1. Bound values are emitted as placeholders, never interpolated; the
//!    parameter list length always equals the placeholder count, in
//!    left-to-right tree order.
//! 2. Every identifier is resolved against the descriptor and quoted;
//!    unknown column names fail before any SQL exists.
//! 3. UPDATE and DELETE without a condition are refused unless the caller
//!    opted in to affecting all rows.

use std::fmt::Write;

use crate::entity::descriptor::{ColumnBinding, EntityDescriptor};
use crate::error::DbError;
use crate::sql::condition::Condition;
use crate::sql::dialect::Dialect;
use crate::sql::spec::{Order, QuerySpec};
use crate::value::Value;

/// One compiled statement: SQL text and its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One SQL text shared by many parameter sets, for batch execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltBatch {
    pub sql: String,
    pub param_sets: Vec<Vec<Value>>,
}

/// Column-to-value pairs extracted from one entity, keyed by column name.
pub type EntityRow = Vec<(String, Value)>;

/// Compiles descriptors and specs into dialect-specific SQL.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder {
    dialect: Dialect,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT <columns> FROM <table> [WHERE ..] [ORDER BY ..] [paging]`.
    ///
    /// When the descriptor declares a soft-delete column, a `= false`
    /// guard on it is appended to the condition, so logically deleted rows
    /// never surface through entity selects.
    pub fn select(
        &self,
        desc: &EntityDescriptor,
        spec: &QuerySpec,
    ) -> Result<BuiltStatement, DbError> {
        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("SELECT ");
        for (i, binding) in desc.columns().iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            r.push_ident(&binding.column);
        }
        r.sql.push_str(" FROM ");
        r.push_ident(desc.table());

        r.render_where(self.effective_condition(desc, spec.condition().cloned()).as_ref())?;
        r.render_order_by(&spec.order)?;
        r.sql.push_str(&self.dialect.limit_offset(spec.limit, spec.offset));
        Ok(r.finish())
    }

    /// `SELECT COUNT(*)` preserving the WHERE clause (and soft-delete
    /// guard); ordering and paging are irrelevant to a count and dropped.
    pub fn count(
        &self,
        desc: &EntityDescriptor,
        spec: &QuerySpec,
    ) -> Result<BuiltStatement, DbError> {
        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("SELECT COUNT(*) FROM ");
        r.push_ident(desc.table());
        r.render_where(self.effective_condition(desc, spec.condition().cloned()).as_ref())?;
        Ok(r.finish())
    }

    /// `INSERT` of all non-generated columns in declaration order.
    /// `values` must align with [`EntityDescriptor::insert_columns`].
    pub fn insert(
        &self,
        desc: &EntityDescriptor,
        values: &[Value],
    ) -> Result<BuiltStatement, DbError> {
        let columns: Vec<&ColumnBinding> = desc.insert_columns().collect();
        if columns.len() != values.len() {
            return Err(DbError::Mapping(format!(
                "table '{}': expected {} insert values, got {}",
                desc.table(),
                columns.len(),
                values.len()
            )));
        }

        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("INSERT INTO ");
        r.push_ident(desc.table());
        r.sql.push_str(" (");
        for (i, binding) in columns.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            r.push_ident(&binding.column);
        }
        r.sql.push_str(") VALUES (");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            r.push_param(value.clone());
        }
        r.sql.push(')');

        if self.dialect.supports_returning() {
            if let Some(generated) = desc.columns().iter().find(|b| b.generated && b.primary_key)
            {
                r.sql.push_str(" RETURNING ");
                r.push_ident(&generated.column);
            }
        }
        Ok(r.finish())
    }

    /// Batch INSERT: one SQL text, one parameter set per row.
    pub fn insert_batch(
        &self,
        desc: &EntityDescriptor,
        rows: &[Vec<Value>],
    ) -> Result<BuiltBatch, DbError> {
        let mut sql = None;
        let mut param_sets = Vec::with_capacity(rows.len());
        for row in rows {
            let built = self.insert(desc, row)?;
            sql.get_or_insert(built.sql);
            param_sets.push(built.params);
        }
        Ok(BuiltBatch {
            sql: sql.unwrap_or_default(),
            param_sets,
        })
    }

    /// `UPDATE` of one entity by primary key.
    ///
    /// All mutable columns are assigned. When a version column exists it
    /// is incremented in the SET list and its current value guards the
    /// WHERE clause; the caller must treat zero affected rows as an
    /// optimistic-lock conflict.
    pub fn update_entity(
        &self,
        desc: &EntityDescriptor,
        row: &EntityRow,
    ) -> Result<BuiltStatement, DbError> {
        desc.require_primary_key()?;

        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("UPDATE ");
        r.push_ident(desc.table());
        r.sql.push_str(" SET ");

        let mut first = true;
        for binding in desc.update_columns() {
            if !first {
                r.sql.push_str(", ");
            }
            first = false;
            r.push_ident(&binding.column);
            r.sql.push_str(" = ");
            r.push_param(row_value(row, &binding.column, desc)?);
        }
        if let Some(version) = desc.version_column() {
            let current = row_value(row, version, desc)?;
            if !first {
                r.sql.push_str(", ");
            }
            r.push_ident(version);
            r.sql.push_str(" = ");
            r.push_param(bump_version(&current, desc)?);
        }

        self.render_pk_predicate(&mut r, desc, row)?;
        Ok(r.finish())
    }

    /// Batch UPDATE by primary key: one SQL text, per-entity parameters.
    pub fn update_batch(
        &self,
        desc: &EntityDescriptor,
        rows: &[EntityRow],
    ) -> Result<BuiltBatch, DbError> {
        let mut sql = None;
        let mut param_sets = Vec::with_capacity(rows.len());
        for row in rows {
            let built = self.update_entity(desc, row)?;
            sql.get_or_insert(built.sql);
            param_sets.push(built.params);
        }
        Ok(BuiltBatch {
            sql: sql.unwrap_or_default(),
            param_sets,
        })
    }

    /// `DELETE` of one entity by primary key, with the same version-guard
    /// conflict semantics as [`SqlBuilder::update_entity`]. A descriptor
    /// with a soft-delete column turns this into an UPDATE of the flag.
    pub fn delete_entity(
        &self,
        desc: &EntityDescriptor,
        row: &EntityRow,
    ) -> Result<BuiltStatement, DbError> {
        desc.require_primary_key()?;
        let soft_flag = desc.soft_delete_column().map(str::to_string);

        let mut r = Renderer::new(self.dialect, desc);
        if let Some(flag) = &soft_flag {
            r.sql.push_str("UPDATE ");
            r.push_ident(desc.table());
            r.sql.push_str(" SET ");
            r.push_ident(flag);
            r.sql.push_str(" = ");
            r.push_param(Value::Bool(true));
            if let Some(version) = desc.version_column() {
                let current = row_value(row, version, desc)?;
                r.sql.push_str(", ");
                r.push_ident(version);
                r.sql.push_str(" = ");
                r.push_param(bump_version(&current, desc)?);
            }
        } else {
            r.sql.push_str("DELETE FROM ");
            r.push_ident(desc.table());
        }

        self.render_pk_predicate(&mut r, desc, row)?;
        if let Some(flag) = &soft_flag {
            // Deleting an already-deleted row must affect nothing.
            r.sql.push_str(" AND ");
            r.push_ident(flag);
            r.sql.push_str(" = ");
            r.push_param(Value::Bool(false));
        }
        Ok(r.finish())
    }

    /// Batch DELETE by primary key.
    pub fn delete_batch(
        &self,
        desc: &EntityDescriptor,
        rows: &[EntityRow],
    ) -> Result<BuiltBatch, DbError> {
        let mut sql = None;
        let mut param_sets = Vec::with_capacity(rows.len());
        for row in rows {
            let built = self.delete_entity(desc, row)?;
            sql.get_or_insert(built.sql);
            param_sets.push(built.params);
        }
        Ok(BuiltBatch {
            sql: sql.unwrap_or_default(),
            param_sets,
        })
    }

    /// Criteria UPDATE: explicit SET pairs plus a condition tree. The
    /// soft-delete guard is appended like on selects, so flagged rows are
    /// never mutated through criteria either.
    ///
    /// # Errors
    ///
    /// `UnsafeOperationError` when the condition is empty and `allow_all`
    /// is not set, and when no SET pairs are given.
    pub fn update_matching(
        &self,
        desc: &EntityDescriptor,
        sets: &[(String, Value)],
        spec: &QuerySpec,
        allow_all: bool,
    ) -> Result<BuiltStatement, DbError> {
        if sets.is_empty() {
            return Err(DbError::UnsafeOperation(format!(
                "UPDATE of table '{}' with no SET columns",
                desc.table()
            )));
        }
        self.require_condition_or_opt_in(desc, "UPDATE", spec, allow_all)?;

        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("UPDATE ");
        r.push_ident(desc.table());
        r.sql.push_str(" SET ");
        for (i, (column, value)) in sets.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            let binding = r.resolve(column)?.column.clone();
            r.push_ident(&binding);
            r.sql.push_str(" = ");
            r.push_param(value.clone());
        }
        r.render_where(self.effective_condition(desc, spec.condition().cloned()).as_ref())?;
        Ok(r.finish())
    }

    /// Criteria DELETE, with the same empty-condition refusal and the same
    /// soft-delete rewrite as the entity variant.
    pub fn delete_matching(
        &self,
        desc: &EntityDescriptor,
        spec: &QuerySpec,
        allow_all: bool,
    ) -> Result<BuiltStatement, DbError> {
        self.require_condition_or_opt_in(desc, "DELETE", spec, allow_all)?;

        if let Some(flag) = desc.soft_delete_column() {
            // The guard inside update_matching keeps already-flagged rows
            // from counting as deleted again.
            let flag = flag.to_string();
            return self.update_matching(desc, &[(flag, Value::Bool(true))], spec, allow_all);
        }

        let mut r = Renderer::new(self.dialect, desc);
        r.sql.push_str("DELETE FROM ");
        r.push_ident(desc.table());
        r.render_where(spec.condition())?;
        Ok(r.finish())
    }

    fn require_condition_or_opt_in(
        &self,
        desc: &EntityDescriptor,
        op: &str,
        spec: &QuerySpec,
        allow_all: bool,
    ) -> Result<(), DbError> {
        if spec.condition().is_none() && !allow_all {
            return Err(DbError::UnsafeOperation(format!(
                "{op} on table '{}' without a condition; call allow_unconditioned() to affect all rows",
                desc.table()
            )));
        }
        Ok(())
    }

    fn render_pk_predicate(
        &self,
        r: &mut Renderer<'_>,
        desc: &EntityDescriptor,
        row: &EntityRow,
    ) -> Result<(), DbError> {
        r.sql.push_str(" WHERE ");
        let pk: Vec<String> = desc.primary_key().to_vec();
        for (i, column) in pk.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(" AND ");
            }
            r.push_ident(column);
            r.sql.push_str(" = ");
            r.push_param(row_value(row, column, desc)?);
        }
        if let Some(version) = desc.version_column() {
            let version = version.to_string();
            let current = row_value(row, &version, desc)?;
            r.sql.push_str(" AND ");
            r.push_ident(&version);
            r.sql.push_str(" = ");
            r.push_param(current);
        }
        Ok(())
    }

    /// Condition with the descriptor's soft-delete guard appended.
    fn effective_condition(
        &self,
        desc: &EntityDescriptor,
        condition: Option<Condition>,
    ) -> Option<Condition> {
        match desc.soft_delete_column() {
            None => condition,
            Some(flag) => {
                let guard = Condition::Eq(flag.to_string(), Value::Bool(false));
                Some(match condition {
                    Some(c) => c.and(guard),
                    None => guard,
                })
            }
        }
    }
}

fn row_value(row: &EntityRow, column: &str, desc: &EntityDescriptor) -> Result<Value, DbError> {
    row.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| {
            DbError::Mapping(format!(
                "table '{}': no value extracted for column '{column}'",
                desc.table()
            ))
        })
}

fn bump_version(current: &Value, desc: &EntityDescriptor) -> Result<Value, DbError> {
    let overflow = || {
        DbError::Mapping(format!(
            "table '{}': version column overflow",
            desc.table()
        ))
    };
    match current {
        Value::Int(v) => v.checked_add(1).map(Value::Int).ok_or_else(overflow),
        Value::BigInt(v) => v.checked_add(1).map(Value::BigInt).ok_or_else(overflow),
        other => Err(DbError::Mapping(format!(
            "table '{}': version value must be an integer, got {}",
            desc.table(),
            other.type_name()
        ))),
    }
}

/// Accumulates SQL text and the parameter list in lockstep, so placeholder
/// indices can never drift from parameter positions.
struct Renderer<'a> {
    dialect: Dialect,
    desc: &'a EntityDescriptor,
    sql: String,
    params: Vec<Value>,
}

impl<'a> Renderer<'a> {
    fn new(dialect: Dialect, desc: &'a EntityDescriptor) -> Self {
        Self {
            dialect,
            desc,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, value: Value) {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    fn push_ident(&mut self, ident: &str) {
        let quoted = self.dialect.quote(ident);
        self.sql.push_str(&quoted);
    }

    fn resolve(&self, name: &str) -> Result<&ColumnBinding, DbError> {
        self.desc.resolve_column(name).ok_or_else(|| {
            DbError::Mapping(format!(
                "table '{}' has no column or field named '{name}'",
                self.desc.table()
            ))
        })
    }

    fn render_where(&mut self, condition: Option<&Condition>) -> Result<(), DbError> {
        if let Some(condition) = condition {
            self.sql.push_str(" WHERE ");
            self.render_condition(condition)?;
        }
        Ok(())
    }

    fn render_condition(&mut self, condition: &Condition) -> Result<(), DbError> {
        match condition {
            Condition::Eq(c, v) => self.render_binary(c, "=", v),
            Condition::Ne(c, v) => self.render_binary(c, "<>", v),
            Condition::Gt(c, v) => self.render_binary(c, ">", v),
            Condition::Ge(c, v) => self.render_binary(c, ">=", v),
            Condition::Lt(c, v) => self.render_binary(c, "<", v),
            Condition::Le(c, v) => self.render_binary(c, "<=", v),
            Condition::Like(c, pattern) => {
                self.render_binary(c, "LIKE", &Value::Text(pattern.clone()))
            }
            Condition::NotLike(c, pattern) => {
                self.render_binary(c, "NOT LIKE", &Value::Text(pattern.clone()))
            }
            Condition::In(c, values) => self.render_in(c, values, false),
            Condition::NotIn(c, values) => self.render_in(c, values, true),
            Condition::Between(c, low, high) => self.render_between(c, low, high, false),
            Condition::NotBetween(c, low, high) => self.render_between(c, low, high, true),
            Condition::IsNull(c) => {
                let column = self.resolve(c)?.column.clone();
                self.push_ident(&column);
                self.sql.push_str(" IS NULL");
                Ok(())
            }
            Condition::IsNotNull(c) => {
                let column = self.resolve(c)?.column.clone();
                self.push_ident(&column);
                self.sql.push_str(" IS NOT NULL");
                Ok(())
            }
            Condition::And(children) => self.render_group(children, " AND "),
            Condition::Or(children) => self.render_group(children, " OR "),
        }
    }

    fn render_binary(&mut self, column: &str, op: &str, value: &Value) -> Result<(), DbError> {
        let column = self.resolve(column)?.column.clone();
        self.push_ident(&column);
        let _ = write!(self.sql, " {op} ");
        self.push_param(value.clone());
        Ok(())
    }

    fn render_in(&mut self, column: &str, values: &[Value], negated: bool) -> Result<(), DbError> {
        if values.is_empty() {
            // Valid SQL with fixed truth value, not a syntax error and
            // never an accidental "match everything".
            self.sql.push_str(if negated { "1 = 1" } else { "1 = 0" });
            return Ok(());
        }
        let column = self.resolve(column)?.column.clone();
        self.push_ident(&column);
        self.sql.push_str(if negated { " NOT IN (" } else { " IN (" });
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_param(value.clone());
        }
        self.sql.push(')');
        Ok(())
    }

    fn render_between(
        &mut self,
        column: &str,
        low: &Value,
        high: &Value,
        negated: bool,
    ) -> Result<(), DbError> {
        let column = self.resolve(column)?.column.clone();
        self.push_ident(&column);
        self.sql
            .push_str(if negated { " NOT BETWEEN " } else { " BETWEEN " });
        self.push_param(low.clone());
        self.sql.push_str(" AND ");
        self.push_param(high.clone());
        Ok(())
    }

    /// Branch nodes render with explicit parentheses so precedence is
    /// preserved at any nesting depth.
    fn render_group(&mut self, children: &[Condition], joiner: &str) -> Result<(), DbError> {
        if children.is_empty() {
            return Err(DbError::Mapping(
                "empty condition group cannot be rendered".to_string(),
            ));
        }
        self.sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(joiner);
            }
            self.render_condition(child)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn render_order_by(&mut self, order: &[(String, Order)]) -> Result<(), DbError> {
        if order.is_empty() {
            return Ok(());
        }
        self.sql.push_str(" ORDER BY ");
        for (i, (column, direction)) in order.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            let column = self.resolve(column)?.column.clone();
            self.push_ident(&column);
            self.sql.push(' ');
            self.sql.push_str(direction.keyword());
        }
        Ok(())
    }

    fn finish(self) -> BuiltStatement {
        BuiltStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::meta::{ColumnMeta, ColumnType, TableMeta};
    use crate::entity::naming::NamingStrategy;
    use crate::sql::condition::col;
    use crate::sql::spec::Order;

    fn customer_desc() -> EntityDescriptor {
        let meta = TableMeta::new("Customer")
            .column(
                ColumnMeta::new("id", ColumnType::BigInt)
                    .primary_key()
                    .generated(),
            )
            .column(ColumnMeta::new("name", ColumnType::Text))
            .column(ColumnMeta::new("age", ColumnType::Integer).nullable())
            .column(ColumnMeta::new("version", ColumnType::BigInt).version());
        EntityDescriptor::from_meta(&meta, &NamingStrategy::SnakeCase).unwrap()
    }

    fn soft_delete_desc() -> EntityDescriptor {
        let meta = TableMeta::new("Document")
            .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
            .column(ColumnMeta::new("title", ColumnType::Text))
            .column(ColumnMeta::new("deleted", ColumnType::Boolean).soft_delete());
        EntityDescriptor::from_meta(&meta, &NamingStrategy::SnakeCase).unwrap()
    }

    fn postgres_placeholder_count(sql: &str) -> usize {
        let bytes = sql.as_bytes();
        let mut count = 0;
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'$' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_select_lists_columns_explicitly() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let built = builder.select(&customer_desc(), &QuerySpec::new()).unwrap();
        assert_eq!(
            built.sql,
            "SELECT \"id\", \"name\", \"age\", \"version\" FROM \"customers\""
        );
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_select_where_order_paging() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new()
            .filter(col("name").like("A%").and(col("age").ge(21)))
            .order_by("id", Order::Desc)
            .limit(10)
            .offset(5);
        let built = builder.select(&customer_desc(), &spec).unwrap();
        assert_eq!(
            built.sql,
            "SELECT \"id\", \"name\", \"age\", \"version\" FROM \"customers\" \
             WHERE (\"name\" LIKE $1 AND \"age\" >= $2) ORDER BY \"id\" DESC LIMIT 10 OFFSET 5"
        );
        assert_eq!(
            built.params,
            vec![Value::Text("A%".to_string()), Value::Int(21)]
        );
    }

    #[test]
    fn test_placeholder_count_always_matches_params() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let specs = vec![
            QuerySpec::new().filter(col("age").between(1, 9)),
            QuerySpec::new().filter(
                col("name")
                    .eq("x")
                    .and(col("age").is_in(vec![1, 2, 3]).or(col("age").is_null())),
            ),
            QuerySpec::new().filter(col("age").is_in(Vec::<i32>::new())),
        ];
        for spec in specs {
            let built = builder.select(&customer_desc(), &spec).unwrap();
            assert_eq!(
                postgres_placeholder_count(&built.sql),
                built.params.len(),
                "sql: {}",
                built.sql
            );
        }
    }

    #[test]
    fn test_nested_groups_are_parenthesized() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(
            col("a".to_string())
                .eq(1)
                .or(col("age").eq(2).and(col("name").eq("x"))),
        );
        // "a" is not a column; use descriptor fields only.
        assert!(builder.select(&customer_desc(), &spec).is_err());

        let spec = QuerySpec::new().filter(
            col("age")
                .eq(1)
                .or(col("age").eq(2).and(col("name").eq("x"))),
        );
        let built = builder.select(&customer_desc(), &spec).unwrap();
        assert!(built
            .sql
            .contains("WHERE (\"age\" = $1 OR (\"age\" = $2 AND \"name\" = $3))"));
    }

    #[test]
    fn test_unknown_column_is_rejected_before_building() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(col("nope; DROP TABLE x").eq(1));
        let err = builder.select(&customer_desc(), &spec).unwrap_err();
        assert!(matches!(err, DbError::Mapping(_)));
    }

    #[test]
    fn test_field_names_resolve_to_columns() {
        let meta = TableMeta::new("Person")
            .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
            .column(ColumnMeta::new("firstName", ColumnType::Text));
        let desc = EntityDescriptor::from_meta(&meta, &NamingStrategy::SnakeCase).unwrap();
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(col("firstName").eq("Ada"));
        let built = builder.select(&desc, &spec).unwrap();
        assert!(built.sql.contains("\"first_name\" = $1"));
    }

    #[test]
    fn test_empty_in_matches_no_rows() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(col("age").is_in(Vec::<i32>::new()));
        let built = builder.select(&customer_desc(), &spec).unwrap();
        assert!(built.sql.ends_with("WHERE 1 = 0"));
        assert!(built.params.is_empty());

        let spec = QuerySpec::new().filter(col("age").not_in(Vec::<i32>::new()));
        let built = builder.select(&customer_desc(), &spec).unwrap();
        assert!(built.sql.ends_with("WHERE 1 = 1"));
    }

    #[test]
    fn test_insert_excludes_generated_key_and_returns_it() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let built = builder
            .insert(
                &customer_desc(),
                &[
                    Value::Text("Ada".to_string()),
                    Value::Int(30),
                    Value::BigInt(0),
                ],
            )
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"customers\" (\"name\", \"age\", \"version\") \
             VALUES ($1, $2, $3) RETURNING \"id\""
        );
        assert_eq!(built.params.len(), 3);
    }

    #[test]
    fn test_insert_mysql_has_no_returning() {
        let builder = SqlBuilder::new(Dialect::MySql);
        let built = builder
            .insert(
                &customer_desc(),
                &[
                    Value::Text("Ada".to_string()),
                    Value::Null,
                    Value::BigInt(0),
                ],
            )
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO `customers` (`name`, `age`, `version`) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_update_entity_bumps_and_guards_version() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let row: EntityRow = vec![
            ("id".to_string(), Value::BigInt(7)),
            ("name".to_string(), Value::Text("A".to_string())),
            ("age".to_string(), Value::Int(30)),
            ("version".to_string(), Value::BigInt(3)),
        ];
        let built = builder.update_entity(&customer_desc(), &row).unwrap();
        assert_eq!(
            built.sql,
            "UPDATE \"customers\" SET \"name\" = $1, \"age\" = $2, \"version\" = $3 \
             WHERE \"id\" = $4 AND \"version\" = $5"
        );
        assert_eq!(
            built.params,
            vec![
                Value::Text("A".to_string()),
                Value::Int(30),
                Value::BigInt(4),
                Value::BigInt(7),
                Value::BigInt(3),
            ]
        );
    }

    #[test]
    fn test_delete_entity_guards_version() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let row: EntityRow = vec![
            ("id".to_string(), Value::BigInt(7)),
            ("name".to_string(), Value::Text("A".to_string())),
            ("age".to_string(), Value::Null),
            ("version".to_string(), Value::BigInt(3)),
        ];
        let built = builder.delete_entity(&customer_desc(), &row).unwrap();
        assert_eq!(
            built.sql,
            "DELETE FROM \"customers\" WHERE \"id\" = $1 AND \"version\" = $2"
        );
        assert_eq!(built.params, vec![Value::BigInt(7), Value::BigInt(3)]);
    }

    #[test]
    fn test_soft_delete_rewrites_to_update() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let row: EntityRow = vec![
            ("id".to_string(), Value::BigInt(1)),
            ("title".to_string(), Value::Text("t".to_string())),
            ("deleted".to_string(), Value::Bool(false)),
        ];
        let built = builder.delete_entity(&soft_delete_desc(), &row).unwrap();
        assert_eq!(
            built.sql,
            "UPDATE \"documents\" SET \"deleted\" = $1 WHERE \"id\" = $2 AND \"deleted\" = $3"
        );
        assert_eq!(
            built.params,
            vec![Value::Bool(true), Value::BigInt(1), Value::Bool(false)]
        );
    }

    #[test]
    fn test_soft_delete_guard_on_select() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let built = builder
            .select(&soft_delete_desc(), &QuerySpec::new())
            .unwrap();
        assert!(built.sql.ends_with("WHERE \"deleted\" = $1"));
        assert_eq!(built.params, vec![Value::Bool(false)]);
    }

    #[test]
    fn test_unconditioned_mutations_are_refused() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let desc = customer_desc();

        let err = builder
            .delete_matching(&desc, &QuerySpec::new(), false)
            .unwrap_err();
        assert!(matches!(err, DbError::UnsafeOperation(_)));

        let err = builder
            .update_matching(
                &desc,
                &[("name".to_string(), Value::Text("x".to_string()))],
                &QuerySpec::new(),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, DbError::UnsafeOperation(_)));
    }

    #[test]
    fn test_opt_in_allows_affect_all_and_omits_where() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let built = builder
            .delete_matching(&customer_desc(), &QuerySpec::new(), true)
            .unwrap();
        assert_eq!(built.sql, "DELETE FROM \"customers\"");
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_criteria_soft_delete_guards_against_reflagging() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(col("title").like("Draft%"));
        let built = builder
            .delete_matching(&soft_delete_desc(), &spec, false)
            .unwrap();
        assert_eq!(
            built.sql,
            "UPDATE \"documents\" SET \"deleted\" = $1 \
             WHERE (\"title\" LIKE $2 AND \"deleted\" = $3)"
        );
        assert_eq!(
            built.params,
            vec![
                Value::Bool(true),
                Value::Text("Draft%".to_string()),
                Value::Bool(false),
            ]
        );
    }

    #[test]
    fn test_criteria_update_skips_soft_deleted_rows() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new().filter(col("title").like("Draft%"));
        let built = builder
            .update_matching(
                &soft_delete_desc(),
                &[("title".to_string(), Value::Text("Final".to_string()))],
                &spec,
                false,
            )
            .unwrap();
        assert_eq!(
            built.sql,
            "UPDATE \"documents\" SET \"title\" = $1 \
             WHERE (\"title\" LIKE $2 AND \"deleted\" = $3)"
        );
        assert_eq!(
            built.params,
            vec![
                Value::Text("Final".to_string()),
                Value::Text("Draft%".to_string()),
                Value::Bool(false),
            ]
        );
    }

    #[test]
    fn test_count_preserves_where() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let spec = QuerySpec::new()
            .filter(col("age").gt(10))
            .order_by("id", Order::Asc)
            .limit(5);
        let built = builder.count(&customer_desc(), &spec).unwrap();
        assert_eq!(
            built.sql,
            "SELECT COUNT(*) FROM \"customers\" WHERE \"age\" > $1"
        );
    }

    #[test]
    fn test_batch_shares_one_sql_text() {
        let builder = SqlBuilder::new(Dialect::Postgres);
        let rows = vec![
            vec![Value::Text("A".to_string()), Value::Int(1), Value::BigInt(0)],
            vec![Value::Text("B".to_string()), Value::Int(2), Value::BigInt(0)],
        ];
        let batch = builder.insert_batch(&customer_desc(), &rows).unwrap();
        assert_eq!(batch.param_sets.len(), 2);
        assert!(batch.sql.starts_with("INSERT INTO \"customers\""));
    }

    #[test]
    fn test_version_bump_requires_integer() {
        let desc = customer_desc();
        assert!(bump_version(&Value::BigInt(1), &desc).is_ok());
        assert!(bump_version(&Value::Text("1".to_string()), &desc).is_err());
        assert!(bump_version(&Value::Null, &desc).is_err());
    }
}
