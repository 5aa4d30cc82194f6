// src/params.rs

//! Processor parameters.
//!
//! A vertex's `args` table (or the `select_args` alternative chosen at run
//! time) is handed to its processor as a [`Params`].

use toml::{Table, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    table: Table,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.table.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.table.get(key).and_then(Value::as_integer)
    }

    /// Float lookup; integers are widened.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.table.get(key)? {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.table.get(key).and_then(Value::as_bool)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.table.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl From<Table> for Params {
    fn from(table: Table) -> Self {
        Self { table }
    }
}

