// Sentiment level time series. Rows are a step function of level over time:
// one row per observed change, never a sample per post. The SQL aggregate
// here mirrors repwatch_common::sentiment::normalized_level.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct SentimentSummary {
    pub sentiment_id: i64,
    pub thread_id: i64,
    pub platform_id: String,
    pub sentiment_level: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SentimentStore {
    pool: PgPool,
}

impl SentimentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The level for a (thread, platform) pair over the trailing 1-hour
    /// window anchored to the newest observation, not wall-clock now.
    /// Returns None when the window holds no scored posts.
    pub async fn window_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        let level = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT SUM((((0.7 * sentiment_score + 0.3 * sentiment_magnitude) + 1) / 2) * 100) / COUNT(*)
            FROM posts
            WHERE thread_id = $1
              AND platform_id = $2
              AND status IN ('sentimented', 'generated')
              AND sentiment_at >= (
                  SELECT MAX(sentiment_at) FROM posts
                  WHERE thread_id = $1
                    AND platform_id = $2
                    AND status IN ('sentimented', 'generated')
              ) - INTERVAL '1 hour'
            "#,
        )
        .bind(thread_id)
        .bind(platform_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(level)
    }

    /// Same formula with the platform filter dropped: the thread-wide level.
    pub async fn overall_window_level(&self, thread_id: i64) -> Result<Option<f64>> {
        let level = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT SUM((((0.7 * sentiment_score + 0.3 * sentiment_magnitude) + 1) / 2) * 100) / COUNT(*)
            FROM posts
            WHERE thread_id = $1
              AND status IN ('sentimented', 'generated')
              AND sentiment_at >= (
                  SELECT MAX(sentiment_at) FROM posts
                  WHERE thread_id = $1
                    AND status IN ('sentimented', 'generated')
              ) - INTERVAL '1 hour'
            "#,
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(level)
    }

    /// Latest stored level for a pair, if any. This is the comparison point
    /// for the change-detection gate.
    pub async fn latest_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        let level = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT sentiment_level FROM sentiment_summary
            WHERE thread_id = $1 AND platform_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    /// Append a level observation. Callers only do this when the level
    /// actually changed; the table is never updated in place.
    pub async fn insert_level(
        &self,
        thread_id: i64,
        platform_id: &str,
        sentiment_level: f64,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sentiment_summary (thread_id, platform_id, sentiment_level)
            VALUES ($1, $2, $3)
            RETURNING sentiment_id
            "#,
        )
        .bind(thread_id)
        .bind(platform_id)
        .bind(sentiment_level)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Latest level per platform for a thread (dashboard read model).
    pub async fn latest_by_platform(&self, thread_id: i64) -> Result<Vec<(String, f64)>> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            r#"
            SELECT DISTINCT ON (platform_id) platform_id, sentiment_level
            FROM sentiment_summary
            WHERE thread_id = $1
            ORDER BY platform_id, created_at DESC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Level rows within a timestamp range, oldest first (time series reads).
    pub async fn by_range(
        &self,
        thread_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentSummary>> {
        let rows = sqlx::query_as::<_, SentimentSummary>(
            r#"
            SELECT * FROM sentiment_summary
            WHERE thread_id = $1 AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(thread_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
