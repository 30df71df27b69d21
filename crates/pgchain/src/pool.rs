//! Pooled connections via `deadpool-postgres`.
//!
//! Pooled clients and pooled transactions implement [`GenericClient`], so a
//! checked-out connection can be handed straight to
//! [`QueryBuilder::execute`](crate::QueryBuilder::execute).
//!
//! ```ignore
//! let pool = pgchain::create_pool(&std::env::var("DATABASE_URL")?)?;
//! let client = pool.get().await?;
//! let resp = pgchain::from("products").select("*").execute(&client).await;
//! ```

use crate::client::{GenericClient, Row};
use crate::error::{OrmError, OrmResult};
use crate::param::SqlParam;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Create a `NoTls` pool with [`DEFAULT_POOL_SIZE`] connections.
pub fn create_pool(database_url: &str) -> OrmResult<Pool> {
    create_pool_with_config(database_url, DEFAULT_POOL_SIZE)
}

/// Create a `NoTls` pool holding at most `max_size` connections.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> OrmResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}

impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }
}

impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }
}

impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> OrmResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }
}
