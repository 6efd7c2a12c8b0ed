//! Provider-neutral query model.
//!
//! Mappers describe reads and writes with these types; providers render them
//! into their own dialect.

use serde_json::Value;
use std::collections::BTreeMap;

/// One stored row, keyed by column name
pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparison: Comparison,
    pub value: Value,
}

impl Condition {
    /// The comparison a provider should render, with `= null` folded into
    /// `IS NULL` and `<> null` into `IS NOT NULL`
    pub fn effective_comparison(&self) -> Comparison {
        match (self.comparison, self.value.is_null()) {
            (Comparison::Eq, true) => Comparison::IsNull,
            (Comparison::NotEq, true) => Comparison::IsNotNull,
            (other, _) => other,
        }
    }
}

/// Conjunction of conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        self.push(column, comparison, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, comparison: Comparison, value: impl Into<Value>) {
        self.conditions.push(Condition {
            column: column.into(),
            comparison,
            value: value.into(),
        });
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::Eq, value)
    }

    pub fn not_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::NotEq, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::Lt, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::Lte, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::Gt, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Comparison::Gte, value)
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(column, Comparison::Like, Value::String(pattern.into()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.with(column, Comparison::IsNull, Value::Null)
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.with(column, Comparison::IsNotNull, Value::Null)
    }

    /// Append every condition of `other`
    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the filter against an in-memory record.
    ///
    /// Missing columns read as `null`. `Like` supports `%` and `_` wildcards.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| {
            let actual = record.get(&condition.column).unwrap_or(&Value::Null);
            compare(actual, condition)
        })
    }
}

fn compare(actual: &Value, condition: &Condition) -> bool {
    let expected = &condition.value;
    match condition.effective_comparison() {
        Comparison::IsNull => actual.is_null(),
        Comparison::IsNotNull => !actual.is_null(),
        Comparison::Eq => !actual.is_null() && loosely_equal(actual, expected),
        Comparison::NotEq => !actual.is_null() && !loosely_equal(actual, expected),
        Comparison::Lt => order(actual, expected).is_some_and(|o| o.is_lt()),
        Comparison::Lte => order(actual, expected).is_some_and(|o| o.is_le()),
        Comparison::Gt => order(actual, expected).is_some_and(|o| o.is_gt()),
        Comparison::Gte => order(actual, expected).is_some_and(|o| o.is_ge()),
        Comparison::Like => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => like(text, pattern),
            _ => false,
        },
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn like(text: &str, pattern: &str) -> bool {
    fn go(text: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|skip| go(&text[skip..], rest)),
            Some(('_', rest)) => !text.is_empty() && go(&text[1..], rest),
            Some((c, rest)) => text
                .first()
                .is_some_and(|t| t.eq_ignore_ascii_case(c))
                && go(&text[1..], rest),
        }
    }
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    go(&text, &pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A read against one table
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub filter: Filter,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
