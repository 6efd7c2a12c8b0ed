//! Shared fixtures for yuow-core integration tests.
//!
//! `MemoryDatabase` is a recording in-memory provider: every statement is
//! logged, transactions roll back by restoring table pre-images, and tests
//! can change rows behind the kernel's back to simulate other writers.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;
use yuow_core::{
    Column, Database, DbTransaction, EntityRepository, Executor, Filter, IsolationLevel, Order,
    PropertyMap, Record, Result, Schema, SchemaOptions, Select, UowError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: String,
    pub in_transaction: bool,
    pub affected: u64,
}

#[derive(Default)]
struct MemoryInner {
    tables: RefCell<BTreeMap<String, Vec<Record>>>,
    keys: RefCell<BTreeMap<String, Vec<String>>>,
    log: RefCell<Vec<Statement>>,
    open_transactions: Cell<u32>,
    fail_next_commit: Cell<bool>,
    isolation_seen: RefCell<Vec<IsolationLevel>>,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Rc<MemoryInner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table with a unique key
    pub fn create_table(&self, table: &str, key: &[&str]) {
        self.inner
            .tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default();
        self.inner.keys.borrow_mut().insert(
            table.to_string(),
            key.iter().map(|k| k.to_string()).collect(),
        );
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .tables
            .borrow()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, filter: &Filter) -> Option<Record> {
        self.rows(table).into_iter().find(|r| filter.matches(r))
    }

    /// Write rows directly, unlogged, as another writer would
    pub fn seed(&self, table: &str, record: Record) {
        self.inner
            .tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .push(record);
    }

    /// Update rows directly, unlogged, as another writer would
    pub fn tamper(&self, table: &str, filter: &Filter, column: &str, value: Value) {
        if let Some(rows) = self.inner.tables.borrow_mut().get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                row.insert(column.to_string(), value.clone());
            }
        }
    }

    pub fn log(&self) -> Vec<Statement> {
        self.inner.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.inner.log.borrow_mut().clear();
    }

    pub fn count(&self, kind: StatementKind) -> usize {
        self.inner
            .log
            .borrow()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.set(true);
    }

    pub fn isolation_seen(&self) -> Vec<IsolationLevel> {
        self.inner.isolation_seen.borrow().clone()
    }

    fn record(&self, kind: StatementKind, table: &str, affected: u64) {
        self.inner.log.borrow_mut().push(Statement {
            kind,
            table: table.to_string(),
            in_transaction: self.inner.open_transactions.get() > 0,
            affected,
        });
    }

    fn key_of(&self, table: &str, record: &Record) -> Option<Vec<Value>> {
        let keys = self.inner.keys.borrow();
        let columns = keys.get(table)?;
        Some(
            columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl Executor for MemoryDatabase {
    fn select(&self, select: &Select) -> Result<Vec<Record>> {
        let mut rows: Vec<Record> = self
            .rows(&select.table)
            .into_iter()
            .filter(|r| select.filter.matches(r))
            .collect();
        rows.sort_by(|a, b| {
            for (column, order) in &select.order_by {
                let left = a.get(column).unwrap_or(&Value::Null);
                let right = b.get(column).unwrap_or(&Value::Null);
                let ordering = match order {
                    Order::Asc => compare_values(left, right),
                    Order::Desc => compare_values(right, left),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(limit) = select.limit {
            rows.truncate(limit as usize);
        }
        self.record(StatementKind::Select, &select.table, rows.len() as u64);
        Ok(rows)
    }

    fn insert(&self, table: &str, record: &Record) -> Result<u64> {
        if let Some(key) = self.key_of(table, record) {
            let duplicate = self
                .rows(table)
                .iter()
                .any(|row| self.key_of(table, row).as_ref() == Some(&key));
            if duplicate {
                return Err(UowError::query(
                    "insert",
                    format!("UNIQUE constraint failed: {table}"),
                ));
            }
        }
        self.inner
            .tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        self.record(StatementKind::Insert, table, 1);
        Ok(1)
    }

    fn update(&self, table: &str, values: &Record, filter: &Filter) -> Result<u64> {
        let mut affected = 0;
        if let Some(rows) = self.inner.tables.borrow_mut().get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        self.record(StatementKind::Update, table, affected);
        Ok(affected)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut affected = 0;
        if let Some(rows) = self.inner.tables.borrow_mut().get_mut(table) {
            let before = rows.len();
            rows.retain(|r| !filter.matches(r));
            affected = (before - rows.len()) as u64;
        }
        self.record(StatementKind::Delete, table, affected);
        Ok(affected)
    }
}

/// Writes go straight to the shared tables; each write first saves the
/// table's pre-image so rollback undoes only this transaction's changes.
pub struct MemoryTransaction<'db> {
    db: &'db MemoryDatabase,
    undo: RefCell<Vec<(String, Vec<Record>)>>,
}

impl MemoryTransaction<'_> {
    fn save(&self, table: &str) {
        self.undo
            .borrow_mut()
            .push((table.to_string(), self.db.rows(table)));
    }

    fn undo(&self) {
        let mut tables = self.db.inner.tables.borrow_mut();
        for (table, rows) in self.undo.borrow_mut().drain(..).rev() {
            tables.insert(table, rows);
        }
    }

    fn close(&self) {
        let open = self.db.inner.open_transactions.get();
        self.db.inner.open_transactions.set(open.saturating_sub(1));
    }
}

impl Executor for MemoryTransaction<'_> {
    fn select(&self, select: &Select) -> Result<Vec<Record>> {
        self.db.select(select)
    }

    fn insert(&self, table: &str, record: &Record) -> Result<u64> {
        self.save(table);
        self.db.insert(table, record)
    }

    fn update(&self, table: &str, values: &Record, filter: &Filter) -> Result<u64> {
        self.save(table);
        self.db.update(table, values, filter)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.save(table);
        self.db.delete(table, filter)
    }
}

impl DbTransaction for MemoryTransaction<'_> {
    fn executor(&self) -> &dyn Executor {
        self
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.close();
        if self.db.inner.fail_next_commit.replace(false) {
            self.undo();
            self.db.record(StatementKind::Rollback, "", 0);
            return Err(UowError::query("commit", "database is locked"));
        }
        self.db.record(StatementKind::Commit, "", 0);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.close();
        self.undo();
        self.db.record(StatementKind::Rollback, "", 0);
        Ok(())
    }
}

impl Database for MemoryDatabase {
    fn executor(&self) -> &dyn Executor {
        self
    }

    fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn DbTransaction + '_>> {
        self.record(StatementKind::Begin, "", 0);
        self.inner.isolation_seen.borrow_mut().push(isolation);
        self.inner
            .open_transactions
            .set(self.inner.open_transactions.get() + 1);
        Ok(Box::new(MemoryTransaction {
            db: self,
            undo: RefCell::new(Vec::new()),
        }))
    }
}

// ---------------------------------------------------------------------------
// Domain fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomerState {
    pub id: String,
    pub name: String,
}

/// Domain type with no persistence code; fields are reached by path
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Customer {
    state: CustomerState,
}

impl Customer {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            state: CustomerState {
                id: id.to_string(),
                name: name.to_string(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn change_name(&mut self, name: &str) {
        self.state.name = name.to_string();
    }
}

pub fn customer_schema() -> Schema<Customer> {
    Schema::new(
        PropertyMap::new()
            .with("state.id", Column::new("id"))
            .with("state.name", Column::new("name")),
        SchemaOptions::new("customers", "state.id").versioned(),
    )
    .expect("valid customer schema")
}

pub fn customers() -> EntityRepository<Customer> {
    customer_schema().create_repository()
}

pub fn customer_db() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    db.create_table("customers", &["id"]);
    db
}

pub fn customer_row(id: &str, name: &str, version: u64) -> Record {
    let mut row = Record::new();
    row.insert("id".into(), Value::from(id));
    row.insert("name".into(), Value::from(name));
    row.insert("version".into(), Value::from(version));
    row
}

pub fn by_id(id: &str) -> Filter {
    Filter::new().eq("id", id)
}
