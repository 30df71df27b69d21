//! Bound parameter values.
//!
//! Every value a chain carries (filter operands, insert/update payloads) is a
//! [`SqlParam`]: a JSON value sent to Postgres as a `$n` parameter in the
//! *text* wire format. The server parses the text with the input function of
//! whatever type it inferred for the placeholder, so one parameter type can
//! target `int8`, `text`, `uuid`, `timestamptz`, enums, `jsonb` or arrays
//! without the builder knowing the column types.

use bytes::BytesMut;
use serde_json::Value;
use std::error::Error;
use tokio_postgres::types::{Format, IsNull, Kind, ToSql, Type};

/// A JSON value bound as a text-format query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam(Value);

impl SqlParam {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// The text handed to the server for a placeholder of type `ty`, or
    /// `None` for SQL `NULL`.
    pub fn encode_text(&self, ty: &Type) -> Option<String> {
        if self.0.is_null() {
            return None;
        }
        if *ty == Type::JSON || *ty == Type::JSONB {
            return Some(self.0.to_string());
        }
        Some(match &self.0 {
            Value::String(s) => s.clone(),
            Value::Array(items) if matches!(ty.kind(), Kind::Array(_)) => array_literal(items),
            other => scalar_text(other),
        })
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render a JSON array as a Postgres array literal (`{1,"a b",NULL}`).
fn array_literal(items: &[Value]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            Value::Null => out.push_str("NULL"),
            Value::Array(inner) => out.push_str(&array_literal(inner)),
            Value::Bool(_) | Value::Number(_) => out.push_str(&scalar_text(item)),
            Value::String(s) => push_array_element(&mut out, s),
            Value::Object(_) => push_array_element(&mut out, &item.to_string()),
        }
    }
    out.push('}');
    out
}

fn push_array_element(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

impl ToSql for SqlParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.encode_text(ty) {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The server validates the text against the placeholder type.
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    tokio_postgres::types::to_sql_checked!();
}
