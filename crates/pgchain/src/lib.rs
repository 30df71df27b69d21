//! # pgchain
//!
//! A chainable, backend-client style query builder for PostgreSQL.
//!
//! ## Features
//!
//! - **Chainable**: `from(table).select(..).eq(..).order(..).limit(..)`
//! - **Parameterized**: every value is a bound `$n` parameter; identifiers are
//!   validated and quoted
//! - **Uniform results**: every execution returns a [`Response`] envelope
//!   (`{data, error, count}`) instead of an `Err`
//! - **Embedded relations**: `select("*, product_metadata(*)")` attaches
//!   related rows, resolved best-effort by naming convention (see [`relation`])
//! - **Transaction-friendly**: run chains on a transaction anywhere a
//!   [`GenericClient`] is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgchain::{from, OrderOptions, SelectOptions};
//! use serde_json::json;
//!
//! // SELECT with an embed, an exact count and a page
//! let resp = from("products")
//!     .select_with("id, title, product_metadata(*)", SelectOptions::exact_count())
//!     .ilike("title", "%widget%")
//!     .order_with("created_at", OrderOptions::desc())
//!     .range(0, 19)
//!     .execute(&client)
//!     .await;
//!
//! // Exactly one row, or a `no-rows` error
//! let resp = from("users").select("*").eq("email", email).single().execute(&client).await;
//! if resp.error.as_ref().is_some_and(|e| e.is_not_found()) { /* 404 */ }
//!
//! // INSERT ... ON CONFLICT ("sku") DO UPDATE
//! let resp = from("products")
//!     .upsert(json!([{"sku": "W-1", "title": "Widget"}]))
//!     .on_conflict("sku")
//!     .execute(&client)
//!     .await;
//!
//! // Inspect the statement without running it
//! let plan = from("orders").delete().eq("id", 7).build()?;
//! assert_eq!(plan.to_sql(), r#"DELETE FROM "orders" WHERE "orders"."id" = $1 RETURNING *"#);
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod escape;
pub mod exec;
pub mod filter;
pub mod ident;
pub mod or_clause;
pub mod param;
pub mod relation;
pub mod response;
pub mod select;
pub mod sql;
pub mod transaction;

pub use builder::{
    Count, InputShape, Operation, OrderOptions, QueryBuilder, QueryPlan, RowMode, SelectOptions,
    from,
};
pub use client::{GenericClient, Row};
pub use config::{ExecConfig, RelationConfig};
pub use error::{OrmError, OrmResult};
pub use exec::Executor;
pub use filter::{CmpOp, FilterOp};
pub use ident::{Ident, validate_ident};
pub use param::SqlParam;
pub use response::{ErrorCode, Response, ResponseError};
pub use select::{JoinSpec, SelectSpec};
pub use sql::Sql;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
