//! The driver boundary.
//!
//! Everything above this module speaks in statements plus bound
//! [`SqlParam`]s and gets back rows as ordered JSON maps. Implementations for
//! `tokio-postgres` clients and transactions are provided; anything else that
//! can run a statement (a test double, a proxy) only needs [`GenericClient::query`].

use crate::error::{OrmError, OrmResult};
use crate::param::SqlParam;
use serde_json::Value;
use tokio_postgres::types::ToSql;

/// One result row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// A trait that unifies database clients and transactions.
///
/// This allows the executor to run a chain on either a plain connection or a
/// transaction, which is how callers get atomicity across several chains.
pub trait GenericClient: Send + Sync {
    /// Execute a row-returning statement and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement, associating a tag for observability.
    ///
    /// The default implementation ignores `tag` and calls [`GenericClient::query`].
    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[SqlParam],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        let _ = tag;
        self.query(sql, params)
    }
}

/// Wrap `sql` so that every returned row is a single JSON object column.
///
/// Data-modifying statements are legal inside a CTE, so the same wrapper works
/// for `SELECT` and for `INSERT/UPDATE/DELETE ... RETURNING`.
pub fn json_rows_sql(sql: &str) -> String {
    format!("WITH q AS ({sql}) SELECT row_to_json(q) FROM q")
}

pub(crate) fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

pub(crate) fn decode_json_row(row: &tokio_postgres::Row) -> OrmResult<Row> {
    let value: Value = row
        .try_get(0)
        .map_err(|e| OrmError::decode("row_to_json", e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OrmError::decode(
            "row_to_json",
            format!("expected a JSON object, got {other}"),
        )),
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        let wrapped = json_rows_sql(sql);
        let refs = param_refs(params);
        let rows = tokio_postgres::Client::query(self, wrapped.as_str(), &refs)
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(decode_json_row).collect()
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        let wrapped = json_rows_sql(sql);
        let refs = param_refs(params);
        let rows = tokio_postgres::Transaction::query(self, wrapped.as_str(), &refs)
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(decode_json_row).collect()
    }
}

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        (*self).query(sql, params).await
    }

    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[SqlParam],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        (*self).query_tagged(tag, sql, params)
    }
}
