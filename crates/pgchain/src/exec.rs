//! Running compiled plans against a client.
//!
//! [`Executor::run`] is the only place statements are sent. It never returns
//! an error or panics past its boundary: every failure ends up in
//! [`Response::error`].

use crate::builder::{InputShape, Operation, QueryPlan, RowMode};
use crate::client::{GenericClient, Row};
use crate::config::ExecConfig;
use crate::error::{OrmError, OrmResult};
use crate::relation;
use crate::response::Response;
use crate::sql::Sql;
use serde_json::Value;
use std::time::Instant;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Runs [`QueryPlan`]s on a borrowed client or transaction.
#[derive(Debug)]
pub struct Executor<'c, C> {
    conn: &'c C,
    config: ExecConfig,
}

impl<'c, C: GenericClient> Executor<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self::with_config(conn, ExecConfig::default())
    }

    pub fn with_config(conn: &'c C, config: ExecConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Run `plan` and wrap the outcome in a [`Response`].
    pub async fn run(&self, plan: &QueryPlan) -> Response {
        match self.try_run(plan).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(
                    target: "pgchain.exec",
                    table = plan.table(),
                    operation = plan.operation().as_str(),
                    error = %err,
                    "chain failed"
                );
                Response::err(err)
            }
        }
    }

    async fn try_run(&self, plan: &QueryPlan) -> OrmResult<Response> {
        match plan.operation() {
            Operation::Select => self.run_select(plan).await,
            op => self.run_write(plan, op).await,
        }
    }

    async fn run_select(&self, plan: &QueryPlan) -> OrmResult<Response> {
        let data = match plan.statement() {
            Some(statement) => {
                let rows = self.fetch(statement).await?;
                self.shape(plan, rows).await?
            }
            None => None,
        };
        let count = match plan.count_statement() {
            Some(sql) => Some(self.fetch_count(sql).await?),
            None => None,
        };
        Ok(Response::ok(data).with_count(count))
    }

    async fn run_write(&self, plan: &QueryPlan, op: Operation) -> OrmResult<Response> {
        if matches!(op, Operation::Update | Operation::Delete)
            && !plan.has_filters()
            && self.config.warn_unscoped_writes
        {
            tracing::warn!(
                target: "pgchain.exec",
                table = plan.table(),
                operation = op.as_str(),
                "{} without filters affects every row",
                op.as_str().to_uppercase()
            );
        }

        // An empty batch insert sends nothing and shapes zero rows.
        let rows = match plan.statement() {
            Some(statement) => self.fetch(statement).await?,
            None => Vec::new(),
        };
        Ok(Response::ok(self.shape(plan, rows).await?))
    }

    /// Resolve embeds and apply the row mode.
    async fn shape(&self, plan: &QueryPlan, mut rows: Vec<Row>) -> OrmResult<Option<Value>> {
        match plan.mode() {
            RowMode::Single => {
                if rows.is_empty() {
                    return Err(OrmError::not_found("Expected 1 row, got 0"));
                }
                rows.truncate(1);
            }
            RowMode::MaybeSingle => rows.truncate(1),
            RowMode::Many => {}
        }

        if !plan.relations().is_empty() {
            relation::resolve_rows(self, &mut rows, plan.relations(), plan.table()).await?;
        }

        let bare_object = match plan.mode() {
            RowMode::Single | RowMode::MaybeSingle => true,
            RowMode::Many => plan.input_shape() == Some(InputShape::Object),
        };
        if bare_object {
            Ok(rows.into_iter().next().map(Value::Object))
        } else {
            Ok(Some(Value::Array(
                rows.into_iter().map(Value::Object).collect(),
            )))
        }
    }

    async fn fetch_count(&self, sql: &Sql) -> OrmResult<i64> {
        let rows = self.fetch(sql).await?;
        let value = rows
            .first()
            .and_then(|row| row.get("count"))
            .ok_or_else(|| OrmError::decode("count", "count query returned no rows"))?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| OrmError::decode("count", format!("not an integer: {value}")))
    }

    /// Send one statement, logging it under `pgchain.sql`.
    pub(crate) async fn fetch(&self, sql: &Sql) -> OrmResult<Vec<Row>> {
        let text = sql.to_sql();
        let tag = self.config.tag.as_deref();
        let logged = match self.config.max_sql_log_length {
            Some(max) if text.len() > max => format!("{}...", truncate_sql_bytes(&text, max)),
            _ => text.clone(),
        };

        let start = Instant::now();
        let result = match tag {
            Some(tag) => self.conn.query_tagged(tag, &text, sql.params()).await,
            None => self.conn.query(&text, sql.params()).await,
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(rows) => tracing::debug!(
                target: "pgchain.sql",
                tag = tag.unwrap_or("-"),
                param_count = sql.params().len(),
                rows = rows.len(),
                elapsed_ms,
                sql = %logged,
            ),
            Err(err) => tracing::debug!(
                target: "pgchain.sql",
                tag = tag.unwrap_or("-"),
                param_count = sql.params().len(),
                elapsed_ms,
                sql = %logged,
                error = %err,
            ),
        }
        result
    }
}
