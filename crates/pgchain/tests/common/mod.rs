//! A scripted in-memory client for integration tests.

#![allow(dead_code)]

use pgchain::{GenericClient, OrmError, OrmResult, Row, SqlParam};
use serde_json::Value;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&str, &[Value]) -> OrmResult<Vec<Row>> + Send + Sync>;

/// One statement as the client received it.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Answers every statement with a handler and records what was sent.
pub struct MockClient {
    handler: Handler,
    log: Mutex<Vec<Executed>>,
}

impl MockClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> OrmResult<Vec<Row>> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every statement returns `rows`.
    pub fn returning(rows: Vec<Value>) -> Self {
        let rows = to_rows(rows);
        Self::new(move |_, _| Ok(rows.clone()))
    }

    /// Every statement fails with the error built by `make`.
    pub fn failing<F>(make: F) -> Self
    where
        F: Fn() -> OrmError + Send + Sync + 'static,
    {
        Self::new(move |_, _| Err(make()))
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }
}

impl GenericClient for MockClient {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        let values: Vec<Value> = params.iter().map(|p| p.value().clone()).collect();
        self.log.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            params: values.clone(),
        });
        (self.handler)(sql, &values)
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("test row must be a JSON object, got {other}"),
    }
}

pub fn to_rows(values: Vec<Value>) -> Vec<Row> {
    values.into_iter().map(row).collect()
}
