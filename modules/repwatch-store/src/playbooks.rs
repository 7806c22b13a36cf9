use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// A generated mitigation playbook. History is retained; readers take the
/// latest row by created_at.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Playbook {
    pub playbook_id: i64,
    pub display_name: String,
    pub thread_id: i64,
    pub assessment: serde_json::Value,
    pub plan: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPlaybook {
    pub display_name: String,
    pub thread_id: i64,
    pub assessment: serde_json::Value,
    pub plan: serde_json::Value,
}

#[derive(Clone)]
pub struct PlaybookStore {
    pool: PgPool,
}

impl PlaybookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, p: NewPlaybook) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO playbooks (display_name, thread_id, assessment, plan)
            VALUES ($1, $2, $3, $4)
            RETURNING playbook_id
            "#,
        )
        .bind(&p.display_name)
        .bind(p.thread_id)
        .bind(&p.assessment)
        .bind(&p.plan)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn latest_by_thread(&self, thread_id: i64) -> Result<Option<Playbook>> {
        let row = sqlx::query_as::<_, Playbook>(
            r#"
            SELECT * FROM playbooks
            WHERE thread_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
