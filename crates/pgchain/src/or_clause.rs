//! The compact `or(...)` filter language.
//!
//! An expression is a comma-separated list of terms, each either
//! `column.operator.value` or a nested `and(...)` / `or(...)` group:
//!
//! ```text
//! status.eq.active,title.ilike.%widget%,and(price.gt.10,is_winning.is.true)
//! ```
//!
//! Supported operators: `eq`, `neq`, `gt`, `gte`, `lt`, `lte`, `like`,
//! `ilike`, `is`, `in`. A value wrapped in double quotes may contain commas.

use crate::error::{OrmError, OrmResult};
use crate::select::split_top_level;
use crate::sql::Sql;
use serde_json::Value;

/// Render `expr` as one parenthesised boolean group whose terms are ORed.
pub fn render(expr: &str, table: &str) -> OrmResult<Sql> {
    render_group(expr, table, " OR ")
}

fn render_group(expr: &str, table: &str, joiner: &str) -> OrmResult<Sql> {
    let terms = split_top_level(expr)?;
    if terms.is_empty() {
        return Err(OrmError::parse(format!("empty filter group {expr:?}")));
    }

    let mut out = Sql::new("(");
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            out.push(joiner);
        }
        out.push_sql(render_term(term, table)?);
    }
    out.push(")");
    Ok(out)
}

fn render_term(term: &str, table: &str) -> OrmResult<Sql> {
    if let Some(inner) = group_body(term, "and") {
        return render_group(inner, table, " AND ");
    }
    if let Some(inner) = group_body(term, "or") {
        return render_group(inner, table, " OR ");
    }

    let mut pieces = term.splitn(3, '.');
    let (Some(column), Some(op), Some(raw)) = (pieces.next(), pieces.next(), pieces.next()) else {
        return Err(OrmError::parse(format!(
            "filter term {term:?} is not column.operator.value"
        )));
    };
    let value = unquote(raw);

    let mut out = Sql::new("(");
    out.push_qualified(table, column)?;
    match op {
        "eq" => match sniff(value) {
            Value::Null => {
                out.push(" IS NULL");
            }
            v => {
                out.push(" = ").push_bind(v);
            }
        },
        "neq" => {
            out.push(" != ").push_bind(value);
        }
        "gt" | "gte" | "lt" | "lte" => {
            let sym = match op {
                "gt" => " > ",
                "gte" => " >= ",
                "lt" => " < ",
                _ => " <= ",
            };
            out.push(sym).push_bind(sniff_number(value));
        }
        "like" => {
            out.push(" LIKE ").push_bind(value);
        }
        "ilike" => {
            out.push(" ILIKE ").push_bind(value);
        }
        "is" => {
            out.push(is_suffix(value).ok_or_else(|| {
                OrmError::parse(format!("`is` expects null, true or false, got {value:?}"))
            })?);
        }
        "in" => {
            let list = value
                .strip_prefix('(')
                .and_then(|v| v.strip_suffix(')'))
                .ok_or_else(|| OrmError::parse(format!("`in` expects (a,b,...), got {value:?}")))?;
            let items = split_top_level(list)?;
            if items.is_empty() {
                // Nothing can match an empty list.
                return Ok(Sql::new("(false)"));
            }
            out.push(" IN (");
            out.push_bind_list(items.into_iter().map(|v| sniff(unquote(v))));
            out.push(")");
        }
        other => {
            return Err(OrmError::parse(format!(
                "unsupported operator {other:?} in filter term {term:?}"
            )));
        }
    }
    out.push(")");
    Ok(out)
}

/// `IS ...` suffix for an `is` operand.
pub(crate) fn is_suffix(value: &str) -> Option<&'static str> {
    match value {
        "null" => Some(" IS NULL"),
        "true" => Some(" IS TRUE"),
        "false" => Some(" IS FALSE"),
        _ => None,
    }
}

fn group_body<'a>(term: &'a str, keyword: &str) -> Option<&'a str> {
    term.strip_prefix(keyword)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Pick a typed value from its literal form: booleans, null, integers, or text.
fn sniff(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        v => match v.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(v),
        },
    }
}

fn sniff_number(value: &str) -> Value {
    if let Ok(n) = value.parse::<i64>() {
        return Value::from(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::from(value),
    }
}
