//! SQL literal rendering for JSON values.
//!
//! Statements are always executed with bound parameters. This module only
//! produces the inlined, human-readable form used by
//! [`QueryPlan::to_inline_sql`](crate::QueryPlan::to_inline_sql) for logs and
//! debugging.

use serde_json::Value;

/// Render `value` as a PostgreSQL literal.
///
/// - `null` → `NULL`
/// - booleans → `true` / `false`
/// - numbers → bare digits
/// - objects and arrays → single-quoted JSON with a `::jsonb` cast
/// - strings → single-quoted, with `'` doubled
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(_) | Value::Object(_) => format!("{}::jsonb", quote(&value.to_string())),
    }
}

/// Single-quote `s`, doubling embedded quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
