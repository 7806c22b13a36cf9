use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// A recurring ingestion job bound to one (thread, platform) pair.
/// `job_id` is deterministic: `scraping-job-{thread_id}-{platform_id}`.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Job {
    pub job_id: String,
    pub thread_id: i64,
    pub platform_id: String,
    pub keywords: Vec<String>,
    pub job_interval: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a job row.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: String,
    pub thread_id: i64,
    pub platform_id: String,
    pub keywords: Vec<String>,
    pub job_interval: String,
    pub status: String,
}

#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_id(&self, job_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn by_thread(&self, thread_id: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE thread_id = $1
            ORDER BY platform_id
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn insert(&self, job: NewJob) -> Result<String> {
        let id = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO jobs (job_id, thread_id, platform_id, keywords, job_interval, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING job_id
            "#,
        )
        .bind(&job.job_id)
        .bind(job.thread_id)
        .bind(&job.platform_id)
        .bind(&job.keywords)
        .bind(&job.job_interval)
        .bind(&job.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Refresh the keyword set for an existing job.
    pub async fn update_keywords(&self, job_id: &str, keywords: &[String]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET keywords = $2
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(keywords)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
