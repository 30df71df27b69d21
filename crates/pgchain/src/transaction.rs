//! Running several chains atomically.
//!
//! Chains never open a transaction on their own: a parent insert followed by
//! dependent inserts are independent statements. To make them atomic, run
//! them on a transaction, which implements [`GenericClient`](crate::GenericClient)
//! like a plain client does. The [`transaction!`](crate::transaction!) macro
//! handles begin, commit and rollback.
//!
//! # Example
//!
//! ```ignore
//! use pgchain::{from, ResponseError};
//! use serde_json::json;
//!
//! # async fn demo(client: &mut tokio_postgres::Client) -> Result<(), ResponseError> {
//! let product = pgchain::transaction!(client, tx, {
//!     let product = from("products")
//!         .insert(json!({"title": "Widget"}))
//!         .execute(&tx)
//!         .await
//!         .into_result()?;
//!     let id = product.as_ref().and_then(|p| p.get("id")).cloned();
//!     from("product_metadata")
//!         .insert(json!({"product_id": id, "color": "red"}))
//!         .execute(&tx)
//!         .await
//!         .into_result()?;
//!     Ok::<_, ResponseError>(product)
//! })?;
//! # Ok(()) }
//! ```
//!
//! Relation embeds that fall through to reverse probes can abort the
//! transaction when a probe fails; see [`relation`](crate::relation).

/// Run `$body` inside a transaction opened on `$client`.
///
/// Commits when the body evaluates to `Ok(_)` and rolls back on `Err(_)`.
/// The body's error type must implement `From<OrmError>` so that begin and
/// commit failures can be reported through it (both
/// [`OrmError`](crate::OrmError) and [`ResponseError`](crate::ResponseError)
/// do). A failed rollback is logged and the body's error is returned.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        match ($client).transaction().await {
            Err(begin_err) => Err($crate::OrmError::from_db_error(begin_err).into()),
            Ok($tx) => {
                let __pgchain_tx_result = async { $body }.await;
                match __pgchain_tx_result {
                    Ok(value) => match $tx.commit().await {
                        Ok(()) => Ok(value),
                        Err(commit_err) => Err($crate::OrmError::from_db_error(commit_err).into()),
                    },
                    Err(error) => {
                        if let Err(rollback_err) = $tx.rollback().await {
                            $crate::transaction::log_rollback_failure(&rollback_err);
                        }
                        Err(error)
                    }
                }
            }
        }
    }};
}

#[doc(hidden)]
pub fn log_rollback_failure(error: &dyn std::fmt::Display) {
    tracing::warn!(
        target: "pgchain.exec",
        error = %error,
        "transaction rollback failed"
    );
}
