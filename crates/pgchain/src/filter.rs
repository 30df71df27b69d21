//! Filter operations and WHERE clause rendering.
//!
//! Filters are always scoped to the base table of a chain, never to an
//! embedded relation, and are ANDed in the order they were added.

use crate::error::{OrmError, OrmResult};
use crate::or_clause;
use crate::sql::Sql;
use serde_json::Value;

/// A binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Like => "LIKE",
            CmpOp::Ilike => "ILIKE",
        }
    }
}

/// One accumulated filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `column <op> value`
    Cmp {
        op: CmpOp,
        column: String,
        value: Value,
    },
    /// `column IS NULL | TRUE | FALSE`
    Is { column: String, value: Value },
    /// `column IN (values...)`; an empty list matches nothing.
    In { column: String, values: Vec<Value> },
    /// A compact `or(...)` expression.
    Or { expression: String },
}

impl FilterOp {
    /// Append this filter as a boolean SQL expression.
    pub fn append_to_sql(&self, table: &str, sql: &mut Sql) -> OrmResult<()> {
        match self {
            FilterOp::Cmp { op, column, value } => {
                sql.push_qualified(table, column)?;
                sql.push(" ").push(op.as_sql()).push(" ").push_bind(value.clone());
            }
            FilterOp::Is { column, value } => {
                let suffix = match value {
                    Value::Null => " IS NULL",
                    Value::Bool(true) => " IS TRUE",
                    Value::Bool(false) => " IS FALSE",
                    Value::String(s) => or_clause::is_suffix(s).ok_or_else(|| {
                        OrmError::parse(format!("`is` expects null, true or false, got {s:?}"))
                    })?,
                    other => {
                        return Err(OrmError::parse(format!(
                            "`is` expects null, true or false, got {other}"
                        )));
                    }
                };
                sql.push_qualified(table, column)?;
                sql.push(suffix);
            }
            FilterOp::In { column, values } => {
                if values.is_empty() {
                    crate::ident::validate_ident(column)?;
                    sql.push("false");
                } else {
                    sql.push_qualified(table, column)?;
                    sql.push(" IN (");
                    sql.push_bind_list(values.iter().cloned());
                    sql.push(")");
                }
            }
            FilterOp::Or { expression } => {
                sql.push_sql(or_clause::render(expression, table)?);
            }
        }
        Ok(())
    }
}

/// Append ` WHERE ...` for `filters`, or nothing when there are none.
pub fn push_where(sql: &mut Sql, table: &str, filters: &[FilterOp]) -> OrmResult<()> {
    if filters.is_empty() {
        return Ok(());
    }
    sql.push(" WHERE ");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            sql.push(" AND ");
        }
        filter.append_to_sql(table, sql)?;
    }
    Ok(())
}
