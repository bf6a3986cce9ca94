//! In-memory database backend for tests.
//!
//! Implements the connection traits over a table store held in a mutex,
//! interpreting the PostgreSQL-flavored statements the builder emits:
//! quoted identifiers, `$n` placeholders, and the WHERE grammar of the
//! condition tree. Transactions snapshot the whole store on BEGIN and
//! restore it on ROLLBACK, which is exact for a single writer.
//!
//! This is a test double, not a database: it supports what the builder
//! produces plus the trivial literals `1 = 0` and `1 = 1`, and rejects
//! anything else loudly.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::connection::{
    ConnectionError, ConnectionHandle, ConnectionPool, ExecOutcome, PreparedStatement,
};
use crate::row::Row;
use crate::value::Value;

type MockRow = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
struct MockTable {
    rows: Vec<MockRow>,
    auto_key: Option<String>,
    next_key: i64,
}

#[derive(Default)]
struct DbState {
    tables: HashMap<String, MockTable>,
    snapshot: Option<HashMap<String, MockTable>>,
    log: Vec<String>,
    exhausted: bool,
    statement_delay: Option<Duration>,
    fail_after: Option<u64>,
}

/// Shared in-memory database. Clone-cheap; hand [`MemoryDb::pool`] to the
/// manager and keep the handle for assertions.
#[derive(Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<DbState>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self) -> Arc<dyn ConnectionPool> {
        Arc::new(MemoryPool {
            state: self.state.clone(),
        })
    }

    /// Registers a table whose `auto_key` column is assigned by the store
    /// when an INSERT omits it. Tables not registered here are created on
    /// first INSERT without key generation.
    pub fn create_table(&self, name: &str, auto_key: Option<&str>) {
        let mut state = self.lock();
        state.tables.insert(
            name.to_string(),
            MockTable {
                rows: Vec::new(),
                auto_key: auto_key.map(str::to_string),
                next_key: 1,
            },
        );
    }

    /// Seeds one row directly, bypassing SQL.
    pub fn seed(&self, table: &str, values: Vec<(&str, Value)>) {
        let mut state = self.lock();
        let table = state.tables.entry(table.to_string()).or_default();
        let row: MockRow = values
            .into_iter()
            .map(|(c, v)| (c.to_string(), v))
            .collect();
        // Keep generated keys ahead of anything seeded explicitly.
        if let Some(key_column) = &table.auto_key {
            if let Some(key) = row.get(key_column).and_then(Value::as_i64) {
                table.next_key = table.next_key.max(key + 1);
            }
        }
        table.rows.push(row);
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// When set, `acquire` fails with a timeout instead of handing out
    /// connections.
    pub fn set_exhausted(&self, exhausted: bool) {
        self.lock().exhausted = exhausted;
    }

    /// Simulated per-statement latency, checked against the deadline.
    pub fn set_statement_delay(&self, delay: Option<Duration>) {
        self.lock().statement_delay = delay;
    }

    /// Lets `count` more statements run, then fails the next one with a
    /// statement error. `None` clears the trap.
    pub fn set_fail_after(&self, count: Option<u64>) {
        self.lock().fail_after = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DbState> {
        self.state.lock().expect("database state poisoned")
    }
}

struct MemoryPool {
    state: Arc<Mutex<DbState>>,
}

impl ConnectionPool for MemoryPool {
    fn acquire(&self, timeout: Duration) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
        let exhausted = self
            .state
            .lock()
            .expect("database state poisoned")
            .exhausted;
        if exhausted {
            return Err(ConnectionError::AcquireTimeout(timeout));
        }
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<DbState>>,
}

impl MemoryConnection {
    fn lock(&self) -> std::sync::MutexGuard<'_, DbState> {
        self.state.lock().expect("database state poisoned")
    }
}

impl ConnectionHandle for MemoryConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>, ConnectionError> {
        Ok(Box::new(MemoryStatement {
            state: self.state.clone(),
            sql: sql.to_string(),
        }))
    }

    fn begin(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        let snapshot = state.tables.clone();
        state.snapshot = Some(snapshot);
        state.log.push("BEGIN".to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        state.snapshot = None;
        state.log.push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        state.log.push("ROLLBACK".to_string());
        Ok(())
    }
}

struct MemoryStatement {
    state: Arc<Mutex<DbState>>,
    sql: String,
}

impl MemoryStatement {
    fn run(
        &self,
        params: &[Value],
        deadline: Option<Instant>,
    ) -> Result<StatementResult, ConnectionError> {
        let mut state = self.state.lock().expect("database state poisoned");
        if let (Some(delay), Some(deadline)) = (state.statement_delay, deadline) {
            if Instant::now() + delay > deadline {
                return Err(ConnectionError::DeadlineExceeded);
            }
        }
        match state.fail_after {
            Some(0) => {
                state.fail_after = None;
                return Err(ConnectionError::Statement(format!(
                    "forced failure: {}",
                    self.sql
                )));
            }
            Some(remaining) => state.fail_after = Some(remaining - 1),
            None => {}
        }
        state.log.push(self.sql.clone());
        let stmt = parse_statement(&self.sql)
            .map_err(|e| ConnectionError::Statement(format!("{e}: {}", self.sql)))?;
        execute_statement(&mut state, &stmt, params)
            .map_err(|e| ConnectionError::Statement(format!("{e}: {}", self.sql)))
    }
}

impl PreparedStatement for MemoryStatement {
    fn query(
        &mut self,
        params: &[Value],
        deadline: Option<Instant>,
    ) -> Result<Vec<Row>, ConnectionError> {
        match self.run(params, deadline)? {
            StatementResult::Rows(rows) => Ok(rows),
            StatementResult::Outcome(_) => Err(ConnectionError::Statement(
                "statement produced no result set".to_string(),
            )),
        }
    }

    fn execute(
        &mut self,
        params: &[Value],
        deadline: Option<Instant>,
    ) -> Result<ExecOutcome, ConnectionError> {
        match self.run(params, deadline)? {
            StatementResult::Outcome(outcome) => Ok(outcome),
            // INSERT .. RETURNING comes back as a one-row result set.
            StatementResult::Rows(rows) => Ok(ExecOutcome {
                rows_affected: rows.len() as u64,
                generated_key: rows
                    .first()
                    .and_then(|r| r.columns().first())
                    .map(|(_, v)| v.clone()),
            }),
        }
    }
}

enum StatementResult {
    Rows(Vec<Row>),
    Outcome(ExecOutcome),
}

// ---------------------------------------------------------------------------
// Parsing

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Word(String),
    Placeholder(usize),
    Number(u64),
    Symbol(String),
}

fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '"' => {
                let mut ident = String::new();
                i += 1;
                while i < chars.len() {
                    if chars[i] == '"' {
                        if chars.get(i + 1) == Some(&'"') {
                            ident.push('"');
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        ident.push(chars[i]);
                        i += 1;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '$' => {
                let mut n = String::new();
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    n.push(chars[i]);
                    i += 1;
                }
                let index: usize = n.parse().map_err(|_| "bad placeholder".to_string())?;
                tokens.push(Token::Placeholder(index));
            }
            '0'..='9' => {
                let mut n = String::new();
                while i < chars.len() && chars[i].is_ascii_digit() {
                    n.push(chars[i]);
                    i += 1;
                }
                let number: u64 = n.parse().map_err(|_| "bad number".to_string())?;
                tokens.push(Token::Number(number));
            }
            '(' | ')' | ',' | '*' => {
                tokens.push(Token::Symbol(c.to_string()));
                i += 1;
            }
            '<' | '>' | '=' => {
                let mut op = c.to_string();
                if let Some(&next) = chars.get(i + 1) {
                    if (c == '<' && (next == '>' || next == '=')) || (c == '>' && next == '=') {
                        op.push(next);
                        i += 1;
                    }
                }
                tokens.push(Token::Symbol(op));
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    word.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Word(word.to_ascii_uppercase()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Statement {
    Select {
        columns: Vec<String>,
        count: bool,
        table: String,
        filter: Option<Expr>,
        order: Vec<(String, bool)>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        placeholders: Vec<usize>,
        returning: Option<String>,
    },
    Update {
        table: String,
        sets: Vec<(String, usize)>,
        filter: Option<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
    },
}

#[derive(Debug)]
enum Expr {
    Binary(String, String, usize),
    In(String, Vec<usize>, bool),
    Between(String, usize, usize, bool),
    IsNull(String, bool),
    Literal(bool),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), String> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(format!("expected {word}"))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), String> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(format!("expected '{symbol}'"))
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(format!("expected identifier, got {other:?}")),
        }
    }

    fn expect_placeholder(&mut self) -> Result<usize, String> {
        match self.next() {
            Some(Token::Placeholder(n)) => Ok(n),
            other => Err(format!("expected placeholder, got {other:?}")),
        }
    }

    fn expect_number(&mut self) -> Result<u64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            other => Err(format!("expected number, got {other:?}")),
        }
    }

    fn statement(&mut self) -> Result<Statement, String> {
        if self.eat_word("SELECT") {
            self.select()
        } else if self.eat_word("INSERT") {
            self.insert()
        } else if self.eat_word("UPDATE") {
            self.update()
        } else if self.eat_word("DELETE") {
            self.delete()
        } else {
            Err("unsupported statement".to_string())
        }
    }

    fn select(&mut self) -> Result<Statement, String> {
        let mut columns = Vec::new();
        let mut count = false;
        if self.eat_word("COUNT") {
            self.expect_symbol("(")?;
            self.expect_symbol("*")?;
            self.expect_symbol(")")?;
            count = true;
        } else {
            loop {
                columns.push(self.expect_ident()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        self.expect_word("FROM")?;
        let table = self.expect_ident()?;
        let filter = self.filter()?;

        let mut order = Vec::new();
        if self.eat_word("ORDER") {
            self.expect_word("BY")?;
            loop {
                let column = self.expect_ident()?;
                let asc = if self.eat_word("DESC") {
                    false
                } else {
                    self.eat_word("ASC");
                    true
                };
                order.push((column, asc));
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.eat_word("LIMIT") {
            limit = Some(self.expect_number()?);
        }
        if self.eat_word("OFFSET") {
            offset = Some(self.expect_number()?);
        }
        Ok(Statement::Select {
            columns,
            count,
            table,
            filter,
            order,
            limit,
            offset,
        })
    }

    fn insert(&mut self) -> Result<Statement, String> {
        self.expect_word("INTO")?;
        let table = self.expect_ident()?;
        self.expect_symbol("(")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expect_ident()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        self.expect_word("VALUES")?;
        self.expect_symbol("(")?;
        let mut placeholders = Vec::new();
        loop {
            placeholders.push(self.expect_placeholder()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        let returning = if self.eat_word("RETURNING") {
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(Statement::Insert {
            table,
            columns,
            placeholders,
            returning,
        })
    }

    fn update(&mut self) -> Result<Statement, String> {
        let table = self.expect_ident()?;
        self.expect_word("SET")?;
        let mut sets = Vec::new();
        loop {
            let column = self.expect_ident()?;
            self.expect_symbol("=")?;
            sets.push((column, self.expect_placeholder()?));
            if !self.eat_symbol(",") {
                break;
            }
        }
        let filter = self.filter()?;
        Ok(Statement::Update {
            table,
            sets,
            filter,
        })
    }

    fn delete(&mut self) -> Result<Statement, String> {
        self.expect_word("FROM")?;
        let table = self.expect_ident()?;
        let filter = self.filter()?;
        Ok(Statement::Delete { table, filter })
    }

    fn filter(&mut self) -> Result<Option<Expr>, String> {
        if self.eat_word("WHERE") {
            Ok(Some(self.or_expr()?))
        } else {
            Ok(None)
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut children = vec![self.and_expr()?];
        while self.eat_word("OR") {
            children.push(self.and_expr()?);
        }
        if children.len() == 1 {
            Ok(children.swap_remove(0))
        } else {
            Ok(Expr::Or(children))
        }
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut children = vec![self.primary()?];
        while self.eat_word("AND") {
            children.push(self.primary()?);
        }
        if children.len() == 1 {
            Ok(children.swap_remove(0))
        } else {
            Ok(Expr::And(children))
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        if self.eat_symbol("(") {
            let inner = self.or_expr()?;
            self.expect_symbol(")")?;
            return Ok(inner);
        }
        // The builder's fixed-truth predicates for empty IN lists.
        if matches!(self.peek(), Some(Token::Number(1))) {
            self.pos += 1;
            self.expect_symbol("=")?;
            let truth = self.expect_number()?;
            return Ok(Expr::Literal(truth == 1));
        }
        let column = self.expect_ident()?;
        self.predicate(column)
    }

    fn predicate(&mut self, column: String) -> Result<Expr, String> {
        if self.eat_word("IS") {
            let negated = self.eat_word("NOT");
            self.expect_word("NULL")?;
            return Ok(Expr::IsNull(column, negated));
        }
        if self.eat_word("NOT") {
            if self.eat_word("LIKE") {
                return Ok(Expr::Binary(
                    column,
                    "NOT LIKE".to_string(),
                    self.expect_placeholder()?,
                ));
            }
            if self.eat_word("IN") {
                return self.in_list(column, true);
            }
            if self.eat_word("BETWEEN") {
                return self.between(column, true);
            }
            return Err("expected LIKE, IN or BETWEEN after NOT".to_string());
        }
        if self.eat_word("LIKE") {
            return Ok(Expr::Binary(
                column,
                "LIKE".to_string(),
                self.expect_placeholder()?,
            ));
        }
        if self.eat_word("IN") {
            return self.in_list(column, false);
        }
        if self.eat_word("BETWEEN") {
            return self.between(column, false);
        }
        match self.next() {
            Some(Token::Symbol(op)) if ["=", "<>", ">", ">=", "<", "<="].contains(&op.as_str()) => {
                Ok(Expr::Binary(column, op, self.expect_placeholder()?))
            }
            other => Err(format!("expected comparison operator, got {other:?}")),
        }
    }

    fn in_list(&mut self, column: String, negated: bool) -> Result<Expr, String> {
        self.expect_symbol("(")?;
        let mut placeholders = Vec::new();
        loop {
            placeholders.push(self.expect_placeholder()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(Expr::In(column, placeholders, negated))
    }

    fn between(&mut self, column: String, negated: bool) -> Result<Expr, String> {
        let low = self.expect_placeholder()?;
        self.expect_word("AND")?;
        let high = self.expect_placeholder()?;
        Ok(Expr::Between(column, low, high, negated))
    }
}

fn parse_statement(sql: &str) -> Result<Statement, String> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
    };
    let stmt = parser.statement()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens".to_string());
    }
    Ok(stmt)
}

// ---------------------------------------------------------------------------
// Evaluation

fn execute_statement(
    state: &mut DbState,
    stmt: &Statement,
    params: &[Value],
) -> Result<StatementResult, String> {
    match stmt {
        Statement::Select {
            columns,
            count,
            table,
            filter,
            order,
            limit,
            offset,
        } => {
            let table = state.tables.entry(table.clone()).or_default();
            let mut matched: Vec<&MockRow> = Vec::new();
            for row in &table.rows {
                if eval_filter(filter.as_ref(), row, params)? {
                    matched.push(row);
                }
            }
            for (column, asc) in order.iter().rev() {
                matched.sort_by(|a, b| {
                    let ordering = compare(
                        a.get(column).unwrap_or(&Value::Null),
                        b.get(column).unwrap_or(&Value::Null),
                    )
                    .unwrap_or(Ordering::Equal);
                    if *asc {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });
            }

            if *count {
                let total = matched.len() as i64;
                return Ok(StatementResult::Rows(vec![Row::new(vec![(
                    "count".to_string(),
                    Value::BigInt(total),
                )])]));
            }

            let skip = offset.unwrap_or(0) as usize;
            let take = limit.map_or(usize::MAX, |l| l as usize);
            let rows = matched
                .into_iter()
                .skip(skip)
                .take(take)
                .map(|row| {
                    Row::new(
                        columns
                            .iter()
                            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                            .collect(),
                    )
                })
                .collect();
            Ok(StatementResult::Rows(rows))
        }
        Statement::Insert {
            table,
            columns,
            placeholders,
            returning,
        } => {
            let table = state.tables.entry(table.clone()).or_default();
            let mut row = MockRow::new();
            for (column, placeholder) in columns.iter().zip(placeholders) {
                row.insert(column.clone(), param(params, *placeholder)?.clone());
            }
            let mut generated = None;
            if let Some(key_column) = table.auto_key.clone() {
                if !row.contains_key(&key_column) {
                    let key = Value::BigInt(table.next_key);
                    table.next_key += 1;
                    row.insert(key_column, key.clone());
                    generated = Some(key);
                }
            }
            if let Some(returning) = returning {
                let value = row.get(returning).cloned().unwrap_or(Value::Null);
                table.rows.push(row);
                return Ok(StatementResult::Rows(vec![Row::new(vec![(
                    returning.clone(),
                    value,
                )])]));
            }
            table.rows.push(row);
            Ok(StatementResult::Outcome(ExecOutcome {
                rows_affected: 1,
                generated_key: generated,
            }))
        }
        Statement::Update {
            table,
            sets,
            filter,
        } => {
            let table = state.tables.entry(table.clone()).or_default();
            let mut affected = 0;
            for row in &mut table.rows {
                if eval_filter(filter.as_ref(), row, params)? {
                    for (column, placeholder) in sets {
                        row.insert(column.clone(), param(params, *placeholder)?.clone());
                    }
                    affected += 1;
                }
            }
            Ok(StatementResult::Outcome(ExecOutcome {
                rows_affected: affected,
                generated_key: None,
            }))
        }
        Statement::Delete { table, filter } => {
            let table = state.tables.entry(table.clone()).or_default();
            let before = table.rows.len();
            let mut error = None;
            table.rows.retain(|row| {
                match eval_filter(filter.as_ref(), row, params) {
                    Ok(matched) => !matched,
                    Err(e) => {
                        error.get_or_insert(e);
                        true
                    }
                }
            });
            if let Some(e) = error {
                return Err(e);
            }
            Ok(StatementResult::Outcome(ExecOutcome {
                rows_affected: (before - table.rows.len()) as u64,
                generated_key: None,
            }))
        }
    }
}

fn param(params: &[Value], index: usize) -> Result<&Value, String> {
    params
        .get(index.wrapping_sub(1))
        .ok_or_else(|| format!("placeholder ${index} has no parameter"))
}

fn eval_filter(filter: Option<&Expr>, row: &MockRow, params: &[Value]) -> Result<bool, String> {
    match filter {
        None => Ok(true),
        Some(expr) => eval(expr, row, params),
    }
}

fn eval(expr: &Expr, row: &MockRow, params: &[Value]) -> Result<bool, String> {
    match expr {
        Expr::Literal(truth) => Ok(*truth),
        Expr::And(children) => {
            for child in children {
                if !eval(child, row, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or(children) => {
            for child in children {
                if eval(child, row, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::IsNull(column, negated) => {
            let is_null = row.get(column).map_or(true, Value::is_null);
            Ok(is_null != *negated)
        }
        Expr::Binary(column, op, placeholder) => {
            let left = row.get(column).unwrap_or(&Value::Null);
            let right = param(params, *placeholder)?;
            // SQL three-valued logic collapses to false here.
            if left.is_null() || right.is_null() {
                return Ok(false);
            }
            match op.as_str() {
                "LIKE" | "NOT LIKE" => {
                    let text = match left {
                        Value::Text(t) => t,
                        _ => return Ok(false),
                    };
                    let pattern = match right {
                        Value::Text(p) => p,
                        _ => return Err("LIKE pattern must be text".to_string()),
                    };
                    let matched = like_match(pattern, text);
                    Ok(if op == "LIKE" { matched } else { !matched })
                }
                _ => {
                    let ordering = match compare(left, right) {
                        Some(o) => o,
                        None => return Ok(false),
                    };
                    Ok(match op.as_str() {
                        "=" => ordering == Ordering::Equal,
                        "<>" => ordering != Ordering::Equal,
                        ">" => ordering == Ordering::Greater,
                        ">=" => ordering != Ordering::Less,
                        "<" => ordering == Ordering::Less,
                        "<=" => ordering != Ordering::Greater,
                        other => return Err(format!("unsupported operator {other}")),
                    })
                }
            }
        }
        Expr::In(column, placeholders, negated) => {
            let left = row.get(column).unwrap_or(&Value::Null);
            if left.is_null() {
                return Ok(false);
            }
            let mut found = false;
            for placeholder in placeholders {
                if compare(left, param(params, *placeholder)?) == Some(Ordering::Equal) {
                    found = true;
                    break;
                }
            }
            Ok(found != *negated)
        }
        Expr::Between(column, low, high, negated) => {
            let left = row.get(column).unwrap_or(&Value::Null);
            if left.is_null() {
                return Ok(false);
            }
            let low = param(params, *low)?;
            let high = param(params, *high)?;
            let inside = matches!(compare(left, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(left, high), Some(Ordering::Less | Ordering::Equal));
            Ok(inside != *negated)
        }
    }
}

/// Orders two values when their types are comparable. Mixed integer
/// widths compare numerically; everything else must match variants.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Decimal(x), Value::Decimal(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::TimestampTz(x), Value::TimestampTz(y)) => Some(x.cmp(y)),
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// `%` matches any run, `_` matches one character.
fn like_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => {
                (0..=text.len()).any(|skip| inner(rest, &text[skip..]))
            }
            Some(('_', rest)) => match text.split_first() {
                Some((_, text_rest)) => inner(rest, text_rest),
                None => false,
            },
            Some((c, rest)) => match text.split_first() {
                Some((t, text_rest)) => c == t && inner(rest, text_rest),
                None => false,
            },
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    inner(&pattern, &text)
}
