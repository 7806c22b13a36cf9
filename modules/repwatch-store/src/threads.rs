use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// A row from the threads table. The `context` field is the semantic anchor
/// for every LLM prompt the pipeline builds for this thread.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Thread {
    pub thread_id: i64,
    pub display_name: String,
    pub thread_type: String,
    pub context: String,
    pub instructions: String,
    pub platform_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a thread. The id is generated on insert.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewThread {
    pub display_name: String,
    pub thread_type: String,
    pub context: String,
    pub instructions: String,
    pub platform_ids: Vec<String>,
}

#[derive(Clone)]
pub struct ThreadStore {
    pool: PgPool,
}

impl ThreadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_id(&self, thread_id: i64) -> Result<Option<Thread>> {
        let row = sqlx::query_as::<_, Thread>(
            r#"
            SELECT * FROM threads
            WHERE thread_id = $1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn insert(&self, t: NewThread) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO threads (display_name, thread_type, context, instructions, platform_ids)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING thread_id
            "#,
        )
        .bind(&t.display_name)
        .bind(&t.thread_type)
        .bind(&t.context)
        .bind(&t.instructions)
        .bind(&t.platform_ids)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Update the mutable fields of a thread in place.
    pub async fn update(&self, thread_id: i64, t: NewThread) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE threads
            SET display_name = $2, thread_type = $3, context = $4,
                instructions = $5, platform_ids = $6, updated_at = now()
            WHERE thread_id = $1
            "#,
        )
        .bind(thread_id)
        .bind(&t.display_name)
        .bind(&t.thread_type)
        .bind(&t.context)
        .bind(&t.instructions)
        .bind(&t.platform_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
