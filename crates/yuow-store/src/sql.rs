//! SQL rendering of the provider query model
//!
//! Identifiers are double-quoted; every value is bound as a numbered
//! parameter (`?1`, `?2`, ...), never spliced into the text.

use crate::errors::{unsupported, Result};
use crate::value::to_sql;
use rusqlite::types::Value as SqlValue;
use yuow_core::{Comparison, Filter, Order, Record, Select};

/// Rendered SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }
}

pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn operator(comparison: Comparison) -> &'static str {
    match comparison {
        Comparison::Eq => "=",
        Comparison::NotEq => "<>",
        Comparison::Lt => "<",
        Comparison::Lte => "<=",
        Comparison::Gt => ">",
        Comparison::Gte => ">=",
        Comparison::Like => "LIKE",
        Comparison::IsNull => "IS NULL",
        Comparison::IsNotNull => "IS NOT NULL",
    }
}

fn push_where(stmt: &mut Statement, filter: &Filter) -> Result<()> {
    if filter.is_empty() {
        return Ok(());
    }
    let mut clauses = Vec::with_capacity(filter.conditions().len());
    for condition in filter.conditions() {
        let column = quote(&condition.column);
        let comparison = condition.effective_comparison();
        let clause = match comparison {
            Comparison::IsNull | Comparison::IsNotNull => {
                format!("{column} {}", operator(comparison))
            }
            _ => {
                let placeholder = stmt.bind(to_sql(&condition.value)?);
                format!("{column} {} {placeholder}", operator(comparison))
            }
        };
        clauses.push(clause);
    }
    stmt.sql.push_str(" WHERE ");
    stmt.sql.push_str(&clauses.join(" AND "));
    Ok(())
}

/// # Errors
///
/// Returns `UowError::Query` when a filter value cannot be bound.
pub fn select(select: &Select) -> Result<Statement> {
    let mut stmt = Statement::new(format!("SELECT * FROM {}", quote(&select.table)));
    push_where(&mut stmt, &select.filter)?;
    if !select.order_by.is_empty() {
        let order: Vec<String> = select
            .order_by
            .iter()
            .map(|(column, order)| {
                let direction = match order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{} {direction}", quote(column))
            })
            .collect();
        stmt.sql.push_str(" ORDER BY ");
        stmt.sql.push_str(&order.join(", "));
    }
    if let Some(limit) = select.limit {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let placeholder = stmt.bind(SqlValue::Integer(limit));
        stmt.sql.push_str(" LIMIT ");
        stmt.sql.push_str(&placeholder);
    }
    Ok(stmt)
}

/// An empty record inserts a row of column defaults.
///
/// # Errors
///
/// Returns `UowError::Query` when a value cannot be bound.
pub fn insert(table: &str, record: &Record) -> Result<Statement> {
    if record.is_empty() {
        return Ok(Statement::new(format!(
            "INSERT INTO {} DEFAULT VALUES",
            quote(table)
        )));
    }
    let mut stmt = Statement::new(String::new());
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    for (column, value) in record {
        columns.push(quote(column));
        placeholders.push(stmt.bind(to_sql(value)?));
    }
    stmt.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(stmt)
}

/// # Errors
///
/// Returns `UowError::Query` when `values` is empty or a value cannot be
/// bound.
pub fn update(table: &str, values: &Record, filter: &Filter) -> Result<Statement> {
    if values.is_empty() {
        return Err(unsupported("update", "no columns to set"));
    }
    let mut stmt = Statement::new(String::new());
    let mut assignments = Vec::with_capacity(values.len());
    for (column, value) in values {
        let placeholder = stmt.bind(to_sql(value)?);
        assignments.push(format!("{} = {placeholder}", quote(column)));
    }
    stmt.sql = format!("UPDATE {} SET {}", quote(table), assignments.join(", "));
    push_where(&mut stmt, filter)?;
    Ok(stmt)
}

/// # Errors
///
/// Returns `UowError::Query` when a filter value cannot be bound.
pub fn delete(table: &str, filter: &Filter) -> Result<Statement> {
    let mut stmt = Statement::new(format!("DELETE FROM {}", quote(table)));
    push_where(&mut stmt, filter)?;
    Ok(stmt)
}
