use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// A row from the posts table. Append-only history for a thread: rows are
/// mutated exactly once (pending → sentimented) and never deleted.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Post {
    pub post_id: String,
    pub thread_id: i64,
    pub platform_id: String,
    pub content: String,
    pub content_type: Option<String>,
    pub status: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_magnitude: Option<f64>,
    pub sentiment_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub sentiment_at: Option<DateTime<Utc>>,
}

/// Parameters for inserting a scraped post (written by ingestion workers).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewPost {
    pub post_id: String,
    pub thread_id: i64,
    pub platform_id: String,
    pub content: String,
    pub content_type: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// One scored result to apply to a pending post.
#[derive(Debug, Clone)]
pub struct SentimentUpdate {
    pub post_id: String,
    pub platform_id: String,
    pub score: f64,
    pub magnitude: f64,
    pub label: String,
}

/// Ranking used by the playbook generator when sampling content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRank {
    Best,
    Worst,
    Neutral,
}

/// Positive/negative/neutral counts over a thread's scored posts.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct LabelCounts {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

#[derive(Clone)]
pub struct PostStore {
    pool: PgPool,
}

impl PostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, p: NewPost) -> Result<String> {
        let id = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO posts (post_id, thread_id, platform_id, content, content_type, status, scraped_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING post_id
            "#,
        )
        .bind(&p.post_id)
        .bind(p.thread_id)
        .bind(&p.platform_id)
        .bind(&p.content)
        .bind(&p.content_type)
        .bind(p.scraped_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// The latest pending posts for a thread, oldest first.
    pub async fn pending_by_thread(&self, thread_id: i64, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE thread_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(thread_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Apply scored results in one transaction. The `status = 'pending'`
    /// guard keeps the transition monotonic: a post that has already moved
    /// on is left untouched. Returns the number of rows that transitioned.
    pub async fn apply_sentiments(&self, updates: &[SentimentUpdate]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;
        for u in updates {
            let result = sqlx::query(
                r#"
                UPDATE posts
                SET sentiment_score = $2, sentiment_magnitude = $3, sentiment_label = $4,
                    status = 'sentimented', sentiment_at = now()
                WHERE post_id = $1 AND status = 'pending'
                "#,
            )
            .bind(&u.post_id)
            .bind(u.score)
            .bind(u.magnitude)
            .bind(&u.label)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Top-N scored posts for a thread, ranked by sentiment score.
    /// Best = most positive, Worst = most negative, Neutral = label 'neutral'
    /// ordered by recency.
    pub async fn top_ranked(&self, thread_id: i64, rank: PostRank, limit: i64) -> Result<Vec<Post>> {
        let sql = match rank {
            PostRank::Best => {
                r#"
                SELECT * FROM posts
                WHERE thread_id = $1 AND status IN ('sentimented', 'generated')
                ORDER BY sentiment_score DESC
                LIMIT $2
                "#
            }
            PostRank::Worst => {
                r#"
                SELECT * FROM posts
                WHERE thread_id = $1 AND status IN ('sentimented', 'generated')
                ORDER BY sentiment_score ASC
                LIMIT $2
                "#
            }
            PostRank::Neutral => {
                r#"
                SELECT * FROM posts
                WHERE thread_id = $1 AND status IN ('sentimented', 'generated')
                  AND sentiment_label = 'neutral'
                ORDER BY sentiment_at DESC
                LIMIT $2
                "#
            }
        };

        let rows = sqlx::query_as::<_, Post>(sql)
            .bind(thread_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Sentiment label distribution over all scored posts of a thread.
    pub async fn label_counts(&self, thread_id: i64) -> Result<LabelCounts> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            SELECT sentiment_label, COUNT(*) FROM posts
            WHERE thread_id = $1 AND status IN ('sentimented', 'generated')
            GROUP BY sentiment_label
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = LabelCounts::default();
        for (label, n) in rows {
            match label.as_deref() {
                Some("positive") => counts.positive = n,
                Some("negative") => counts.negative = n,
                Some("neutral") => counts.neutral = n,
                _ => {}
            }
        }
        Ok(counts)
    }
}
