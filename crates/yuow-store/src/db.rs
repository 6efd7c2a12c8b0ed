//! Database connection management
//!
//! `SqliteDatabase` owns one connection and implements the kernel's
//! provider traits on it. Transactions borrow the connection.

use crate::errors::{from_rusqlite, Result};
use crate::sql::{self, Statement};
use crate::value::from_sql;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use yuow_core::{Database, DbTransaction, Executor, Filter, IsolationLevel, Record, Select};

/// How long a writer waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open a SQLite database at the given path
    ///
    /// # Errors
    ///
    /// Returns `UowError::Query` when the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Connection::open(path)
            .map(Self::from_connection)
            .map_err(from_rusqlite)
    }

    /// Open an in-memory SQLite database (for testing)
    ///
    /// # Errors
    ///
    /// Returns `UowError::Query` when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Connection::open_in_memory()
            .map(Self::from_connection)
            .map_err(from_rusqlite)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Configure the connection for concurrent writers
    ///
    /// # Errors
    ///
    /// Returns `UowError::Query` when a pragma fails.
    pub fn configure(&self) -> Result<()> {
        // Enable foreign keys
        self.conn
            .pragma_update(None, "foreign_keys", true)
            .map_err(from_rusqlite)?;

        // Set WAL mode for better concurrency
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(from_rusqlite)?;
        debug!(journal_mode = %mode, "sqlite connection configured");

        self.conn
            .busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(from_rusqlite)
    }

    /// Run schema setup or other multi-statement SQL
    ///
    /// # Errors
    ///
    /// Returns `UowError::Query` when any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(from_rusqlite)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

fn read_rows(conn: &Connection, table: &str, stmt: &Statement) -> Result<Vec<Record>> {
    debug!(sql = %stmt.sql, params = stmt.params.len(), "select");
    let mut prepared = conn.prepare(&stmt.sql).map_err(from_rusqlite)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = prepared
        .query(params_from_iter(stmt.params.iter()))
        .map_err(from_rusqlite)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(from_rusqlite)? {
        let mut record = Record::new();
        for (index, column) in columns.iter().enumerate() {
            let value = row.get_ref(index).map_err(from_rusqlite)?;
            record.insert(column.clone(), from_sql(table, column, value)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn execute(conn: &Connection, stmt: &Statement) -> Result<u64> {
    let affected = conn
        .execute(&stmt.sql, params_from_iter(stmt.params.iter()))
        .map_err(from_rusqlite)?;
    debug!(sql = %stmt.sql, affected, "execute");
    Ok(affected as u64)
}

/// Provider operations against any connection, plain or inside a transaction
fn run_select(conn: &Connection, select: &Select) -> Result<Vec<Record>> {
    read_rows(conn, &select.table, &sql::select(select)?)
}

fn run_insert(conn: &Connection, table: &str, record: &Record) -> Result<u64> {
    execute(conn, &sql::insert(table, record)?)
}

fn run_update(conn: &Connection, table: &str, values: &Record, filter: &Filter) -> Result<u64> {
    execute(conn, &sql::update(table, values, filter)?)
}

fn run_delete(conn: &Connection, table: &str, filter: &Filter) -> Result<u64> {
    execute(conn, &sql::delete(table, filter)?)
}

impl Executor for SqliteDatabase {
    fn select(&self, select: &Select) -> yuow_core::Result<Vec<Record>> {
        run_select(&self.conn, select)
    }

    fn insert(&self, table: &str, record: &Record) -> yuow_core::Result<u64> {
        run_insert(&self.conn, table, record)
    }

    fn update(&self, table: &str, values: &Record, filter: &Filter) -> yuow_core::Result<u64> {
        run_update(&self.conn, table, values, filter)
    }

    fn delete(&self, table: &str, filter: &Filter) -> yuow_core::Result<u64> {
        run_delete(&self.conn, table, filter)
    }
}

/// Begin behaviour for an isolation level.
///
/// SQLite transactions are serializable; `serializable` additionally takes
/// the write lock up front so the transaction cannot fail on upgrade.
pub fn behavior_for(isolation: IsolationLevel) -> TransactionBehavior {
    match isolation {
        IsolationLevel::Serializable => TransactionBehavior::Immediate,
        IsolationLevel::ReadUncommitted
        | IsolationLevel::ReadCommitted
        | IsolationLevel::RepeatableRead
        | IsolationLevel::Snapshot => TransactionBehavior::Deferred,
    }
}

impl Database for SqliteDatabase {
    fn executor(&self) -> &dyn Executor {
        self
    }

    fn begin(&self, isolation: IsolationLevel) -> yuow_core::Result<Box<dyn DbTransaction + '_>> {
        self.conn
            .pragma_update(
                None,
                "read_uncommitted",
                isolation == IsolationLevel::ReadUncommitted,
            )
            .map_err(from_rusqlite)?;
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, behavior_for(isolation))
            .map_err(from_rusqlite)?;
        debug!(isolation = %isolation, "sqlite transaction begun");
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// An open SQLite transaction; dropping it without commit rolls back
pub struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl Executor for SqliteTransaction<'_> {
    fn select(&self, select: &Select) -> yuow_core::Result<Vec<Record>> {
        run_select(&self.tx, select)
    }

    fn insert(&self, table: &str, record: &Record) -> yuow_core::Result<u64> {
        run_insert(&self.tx, table, record)
    }

    fn update(&self, table: &str, values: &Record, filter: &Filter) -> yuow_core::Result<u64> {
        run_update(&self.tx, table, values, filter)
    }

    fn delete(&self, table: &str, filter: &Filter) -> yuow_core::Result<u64> {
        run_delete(&self.tx, table, filter)
    }
}

impl DbTransaction for SqliteTransaction<'_> {
    fn executor(&self) -> &dyn Executor {
        self
    }

    fn commit(self: Box<Self>) -> yuow_core::Result<()> {
        self.tx.commit().map_err(from_rusqlite)
    }

    fn rollback(self: Box<Self>) -> yuow_core::Result<()> {
        self.tx.rollback().map_err(from_rusqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE items (id TEXT PRIMARY KEY, qty INTEGER)")
            .unwrap();
        db
    }

    fn item(id: &str, qty: i64) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert("qty".into(), json!(qty));
        record
    }

    #[test]
    fn test_isolation_behavior_mapping() {
        assert!(matches!(
            behavior_for(IsolationLevel::Serializable),
            TransactionBehavior::Immediate
        ));
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Snapshot,
        ] {
            assert!(matches!(behavior_for(level), TransactionBehavior::Deferred));
        }
    }

    #[test]
    fn test_executor_round_trip() {
        let db = db();
        assert_eq!(db.insert("items", &item("a", 1)).unwrap(), 1);

        let mut qty = Record::new();
        qty.insert("qty".into(), json!(5));
        assert_eq!(
            db.update("items", &qty, &Filter::new().eq("id", "a")).unwrap(),
            1
        );
        assert_eq!(
            db.select(&Select::from("items")).unwrap(),
            vec![item("a", 5)]
        );
        assert_eq!(db.delete("items", &Filter::new().eq("id", "zzz")).unwrap(), 0);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let db = db();
        let tx = db.begin(IsolationLevel::ReadCommitted).unwrap();
        tx.executor().insert("items", &item("a", 1)).unwrap();
        tx.rollback().unwrap();

        assert!(db.select(&Select::from("items")).unwrap().is_empty());
    }

    #[test]
    fn test_commit_keeps_writes() {
        let db = db();
        let tx = db.begin(IsolationLevel::Serializable).unwrap();
        tx.executor().insert("items", &item("a", 1)).unwrap();
        tx.commit().unwrap();

        assert_eq!(db.select(&Select::from("items")).unwrap().len(), 1);
    }

    #[test]
    fn test_read_uncommitted_sets_pragma() {
        let db = db();
        let tx = db.begin(IsolationLevel::ReadUncommitted).unwrap();
        let flag: i64 = db
            .connection()
            .query_row("PRAGMA read_uncommitted", [], |row| row.get(0))
            .unwrap();
        tx.rollback().unwrap();

        assert_eq!(flag, 1);
    }

    #[test]
    fn test_unique_violation_is_query_error() {
        let db = db();
        db.insert("items", &item("a", 1)).unwrap();

        let err = db.insert("items", &item("a", 2)).unwrap_err();

        assert_eq!(err.code(), "ERR_QUERY");
        assert!(err.to_string().contains("UNIQUE"));
    }
}
