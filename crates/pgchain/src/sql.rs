//! Parameter-safe SQL fragment builder.
//!
//! `Sql` stores raw SQL pieces and bound values separately and numbers the
//! `$1, $2, ...` placeholders when rendered, so fragments (a WHERE clause, an
//! `or(...)` group, a VALUES row) can be composed without tracking indices.
//!
//! # Example
//!
//! ```ignore
//! use pgchain::Sql;
//!
//! let mut q = Sql::new("SELECT * FROM ");
//! q.push_ident("products")?;
//! q.push(" WHERE ");
//! q.push_qualified("products", "id")?.push(" = ").push_bind(1);
//! assert_eq!(q.to_sql(), r#"SELECT * FROM "products" WHERE "products"."id" = $1"#);
//! # Ok::<(), pgchain::OrmError>(())
//! ```

use crate::error::OrmResult;
use crate::escape;
use crate::ident::Ident;
use crate::param::SqlParam;
use serde_json::Value;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A SQL statement or fragment with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<SqlParam>,
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    /// Create an empty builder.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(SqlParam::new(value));
        self
    }

    /// Append a comma-separated list of placeholders and bind all values.
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = Value>) -> &mut Self {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(v);
        }
        self
    }

    /// Append another `Sql` fragment, consuming it.
    pub fn push_sql(&mut self, mut other: Sql) -> &mut Self {
        for part in other.parts.drain(..) {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.append(&mut other.params);
        self
    }

    /// Append a validated, double-quoted identifier.
    pub fn push_ident(&mut self, ident: &str) -> OrmResult<&mut Self> {
        let ident = Ident::parse(ident)?;
        Ok(self.push(&ident.to_sql()))
    }

    /// Append `"table"."column"`, validating both.
    pub fn push_qualified(&mut self, table: &str, column: &str) -> OrmResult<&mut Self> {
        self.push_ident(table)?;
        self.push(".");
        self.push_ident(column)
    }

    /// Whether nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, SqlPart::Raw(s) if s.is_empty()))
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut idx: usize = 0;

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(&mut out, "${}", idx);
                }
            }
        }
        out
    }

    /// Render SQL with every parameter inlined as a literal.
    ///
    /// For logs and debugging only; execution always binds.
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::new();
        let mut params = self.params.iter();

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => match params.next() {
                    Some(p) => out.push_str(&escape::literal(p.value())),
                    None => out.push_str("NULL"),
                },
            }
        }
        out
    }

    /// Bound parameters in placeholder order.
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}
