//! Shared fixtures for yuow-store integration tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use yuow_core::{
    Column, EntityRepository, Executor, Filter, PropertyMap, Record, Schema, SchemaOptions, Select,
};
use yuow_store::SqliteDatabase;

pub const CUSTOMERS_DDL: &str = "CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    visits INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL
)";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub visits: u64,
}

impl Customer {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            visits: 0,
        }
    }
}

pub fn customers() -> EntityRepository<Customer> {
    Schema::new(
        PropertyMap::new()
            .with("id", Column::new("id"))
            .with("name", Column::new("name"))
            .with("visits", Column::new("visits")),
        SchemaOptions::new("customers", "id").versioned(),
    )
    .expect("valid customer schema")
    .create_repository()
}

pub fn memory_db() -> SqliteDatabase {
    let db = SqliteDatabase::open_in_memory().expect("in-memory database");
    db.execute_batch(CUSTOMERS_DDL).expect("customers table");
    db
}

pub fn file_db(path: &Path) -> SqliteDatabase {
    let db = SqliteDatabase::open(path).expect("database file");
    db.configure().expect("configure connection");
    db.execute_batch(CUSTOMERS_DDL).expect("customers table");
    db
}

pub fn seed(db: &SqliteDatabase, id: &str, name: &str, version: u64) {
    db.connection()
        .execute(
            "INSERT INTO customers (id, name, version) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, name, version as i64],
        )
        .expect("seed customer");
}

pub fn bump_version(db: &SqliteDatabase, id: &str) {
    db.connection()
        .execute(
            "UPDATE customers SET version = version + 1 WHERE id = ?1",
            [id],
        )
        .expect("bump version");
}

pub fn rows(db: &SqliteDatabase) -> Vec<Record> {
    db.select(&Select::from("customers").order_by("id", yuow_core::Order::Asc))
        .expect("select customers")
}

pub fn row(db: &SqliteDatabase, id: &str) -> Option<Record> {
    db.select(&Select::from("customers").filter(Filter::new().eq("id", id)))
        .expect("select customer")
        .into_iter()
        .next()
}

pub fn field(record: &Record, column: &str) -> Value {
    record.get(column).cloned().unwrap_or(Value::Null)
}
