use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// Static reference data for an ingestion platform. `secret` is an opaque
/// encoded credential blob; this layer never decodes it.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Platform {
    pub platform_id: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub endpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct PlatformStore {
    pool: PgPool,
}

impl PlatformStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<Vec<Platform>> {
        let rows = sqlx::query_as::<_, Platform>(
            r#"
            SELECT * FROM platforms
            ORDER BY platform_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
