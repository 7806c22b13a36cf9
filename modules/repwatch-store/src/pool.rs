use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use repwatch_common::retry_with_backoff;

use crate::error::Result;

/// Max physical connections in the pool. The pipeline stages are short-lived
/// HTTP requests, so the pool is shared across all of them.
const POOL_MAX_CONNECTIONS: u32 = 40;

/// Recycle physical connections after 30 minutes.
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Connect attempts before giving up. Applies only to establishing the pool;
/// individual statements are never retried automatically.
const CONNECT_ATTEMPTS: u32 = 3;

/// Connect to Postgres with a bounded pool and a 3-attempt exponential
/// backoff on the initial connection.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = retry_with_backoff(CONNECT_ATTEMPTS, Duration::from_secs(1), || async {
        PgPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .max_lifetime(POOL_MAX_LIFETIME)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
    })
    .await?;
    info!(max_connections = POOL_MAX_CONNECTIONS, "Connected to Postgres");
    Ok(pool)
}
