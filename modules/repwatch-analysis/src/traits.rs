// Trait seam between the pipeline and Postgres. The pipeline only sees the
// narrow operations below; `repwatch_store::Store` implements them and
// `testing::MockPipelineStore` replaces them for deterministic tests with
// no database and no Docker.

use anyhow::Result;
use async_trait::async_trait;

use chrono::{DateTime, Utc};

use repwatch_common::RepwatchError;
use repwatch_store::{
    Job, LabelCounts, NewJob, NewPlaybook, NewPost, NewThread, Platform, Playbook, Post, PostRank,
    SentimentSummary, SentimentUpdate, Store, StoreError, Thread,
};

#[async_trait]
pub trait PipelineStore: Send + Sync {
    // --- Threads ---

    async fn thread_by_id(&self, thread_id: i64) -> Result<Option<Thread>>;

    async fn insert_thread(&self, thread: NewThread) -> Result<i64>;

    /// Returns the number of rows touched (0 when the thread is unknown).
    async fn update_thread(&self, thread_id: i64, thread: NewThread) -> Result<u64>;

    // --- Platforms ---

    async fn platforms(&self) -> Result<Vec<Platform>>;

    // --- Posts ---

    /// Register a scraped post in `pending` state; returns its id.
    async fn insert_post(&self, post: NewPost) -> Result<String>;

    /// Pending posts for a thread, oldest first.
    async fn pending_posts(&self, thread_id: i64, limit: i64) -> Result<Vec<Post>>;

    /// Apply scored results; returns how many rows transitioned to
    /// `sentimented`.
    async fn apply_sentiments(&self, updates: &[SentimentUpdate]) -> Result<u64>;

    /// Top-N scored posts by rank for playbook assembly.
    async fn top_posts(&self, thread_id: i64, rank: PostRank, limit: i64) -> Result<Vec<Post>>;

    async fn label_counts(&self, thread_id: i64) -> Result<LabelCounts>;

    // --- Sentiment levels ---

    /// Trailing-window level for a (thread, platform) pair; None when the
    /// window is empty.
    async fn window_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>>;

    /// Trailing-window level across all platforms of a thread.
    async fn overall_window_level(&self, thread_id: i64) -> Result<Option<f64>>;

    /// Latest stored level for a pair, the comparison point for the gate.
    async fn latest_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>>;

    async fn insert_level(&self, thread_id: i64, platform_id: &str, level: f64) -> Result<i64>;

    /// Latest stored level per platform (read model).
    async fn latest_by_platform(&self, thread_id: i64) -> Result<Vec<(String, f64)>>;

    /// Level rows within a timestamp range, oldest first (time series reads).
    async fn levels_in_range(
        &self,
        thread_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentSummary>>;

    // --- Playbooks ---

    async fn insert_playbook(&self, playbook: NewPlaybook) -> Result<i64>;

    async fn latest_playbook(&self, thread_id: i64) -> Result<Option<Playbook>>;

    // --- Jobs ---

    async fn job_by_id(&self, job_id: &str) -> Result<Option<Job>>;

    async fn jobs_by_thread(&self, thread_id: i64) -> Result<Vec<Job>>;

    async fn insert_job(&self, job: NewJob) -> Result<String>;

    /// Replace the keyword set of an existing job.
    async fn update_job_keywords(&self, job_id: &str, keywords: &[String]) -> Result<u64>;

    // --- Dedup ledger ---

    /// Insert-if-absent on the dedup ledger. True means this caller won the
    /// insert and owns the event.
    async fn mark_blob_if_absent(&self, blob_name: &str, ops_id: &str) -> Result<bool>;
}

/// Carry store failures under their own taxonomy variant so callers can
/// tell a database fault from a collaborator fault.
fn db_err(e: StoreError) -> anyhow::Error {
    RepwatchError::Database(e.to_string()).into()
}

#[async_trait]
impl PipelineStore for Store {
    async fn thread_by_id(&self, thread_id: i64) -> Result<Option<Thread>> {
        Ok(self.threads.by_id(thread_id).await.map_err(db_err)?)
    }

    async fn insert_thread(&self, thread: NewThread) -> Result<i64> {
        Ok(self.threads.insert(thread).await.map_err(db_err)?)
    }

    async fn update_thread(&self, thread_id: i64, thread: NewThread) -> Result<u64> {
        Ok(self.threads.update(thread_id, thread).await.map_err(db_err)?)
    }

    async fn platforms(&self) -> Result<Vec<Platform>> {
        Ok(self.platforms.all().await.map_err(db_err)?)
    }

    async fn insert_post(&self, post: NewPost) -> Result<String> {
        Ok(self.posts.insert(post).await.map_err(db_err)?)
    }

    async fn pending_posts(&self, thread_id: i64, limit: i64) -> Result<Vec<Post>> {
        Ok(self.posts.pending_by_thread(thread_id, limit).await.map_err(db_err)?)
    }

    async fn apply_sentiments(&self, updates: &[SentimentUpdate]) -> Result<u64> {
        Ok(self.posts.apply_sentiments(updates).await.map_err(db_err)?)
    }

    async fn top_posts(&self, thread_id: i64, rank: PostRank, limit: i64) -> Result<Vec<Post>> {
        Ok(self.posts.top_ranked(thread_id, rank, limit).await.map_err(db_err)?)
    }

    async fn label_counts(&self, thread_id: i64) -> Result<LabelCounts> {
        Ok(self.posts.label_counts(thread_id).await.map_err(db_err)?)
    }

    async fn window_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        Ok(self.sentiment.window_level(thread_id, platform_id).await.map_err(db_err)?)
    }

    async fn overall_window_level(&self, thread_id: i64) -> Result<Option<f64>> {
        Ok(self.sentiment.overall_window_level(thread_id).await.map_err(db_err)?)
    }

    async fn latest_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        Ok(self.sentiment.latest_level(thread_id, platform_id).await.map_err(db_err)?)
    }

    async fn insert_level(&self, thread_id: i64, platform_id: &str, level: f64) -> Result<i64> {
        Ok(self
            .sentiment
            .insert_level(thread_id, platform_id, level)
            .await.map_err(db_err)?)
    }

    async fn latest_by_platform(&self, thread_id: i64) -> Result<Vec<(String, f64)>> {
        Ok(self.sentiment.latest_by_platform(thread_id).await.map_err(db_err)?)
    }

    async fn levels_in_range(
        &self,
        thread_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentSummary>> {
        Ok(self.sentiment.by_range(thread_id, start, end).await.map_err(db_err)?)
    }

    async fn insert_playbook(&self, playbook: NewPlaybook) -> Result<i64> {
        Ok(self.playbooks.insert(playbook).await.map_err(db_err)?)
    }

    async fn latest_playbook(&self, thread_id: i64) -> Result<Option<Playbook>> {
        Ok(self.playbooks.latest_by_thread(thread_id).await.map_err(db_err)?)
    }

    async fn job_by_id(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.by_id(job_id).await.map_err(db_err)?)
    }

    async fn jobs_by_thread(&self, thread_id: i64) -> Result<Vec<Job>> {
        Ok(self.jobs.by_thread(thread_id).await.map_err(db_err)?)
    }

    async fn insert_job(&self, job: NewJob) -> Result<String> {
        Ok(self.jobs.insert(job).await.map_err(db_err)?)
    }

    async fn update_job_keywords(&self, job_id: &str, keywords: &[String]) -> Result<u64> {
        Ok(self.jobs.update_keywords(job_id, keywords).await.map_err(db_err)?)
    }

    async fn mark_blob_if_absent(&self, blob_name: &str, ops_id: &str) -> Result<bool> {
        Ok(self.marked_blobs.mark_if_absent(blob_name, ops_id).await.map_err(db_err)?)
    }
}
