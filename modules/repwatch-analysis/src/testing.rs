// In-memory doubles for the pipeline's external seams. The store mock keeps
// its data behind one mutex and recomputes the trailing-window level with
// the same formula the SQL aggregate uses, so gate tests exercise the real
// comparison semantics without Postgres.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use ai_client::{
    BatchClassifier, BatchJob, BatchJobState, ReportGenerator, Sentiment, SentimentClassifier,
};
use blob_client::MemoryBlobStore;
use repwatch_common::sentiment::normalized_level;
use repwatch_store::{
    Job, LabelCounts, NewJob, NewPlaybook, NewPost, NewThread, Platform, Playbook, Post, PostRank,
    SentimentSummary, SentimentUpdate, Thread,
};

use crate::context::PipelineContext;
use crate::scheduler::{SchedulerClient, TriggerSpec};
use crate::traits::PipelineStore;

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// A context wired entirely to in-memory doubles. Tests overwrite the
/// fields they care about.
pub fn test_context(store: Arc<MockPipelineStore>) -> PipelineContext {
    PipelineContext {
        store,
        blobs: Arc::new(MemoryBlobStore::new()),
        classifier: Arc::new(MockClassifier::returning(0.0, 0.0)),
        generator: Arc::new(MockGenerator::with_responses(Vec::new())),
        batch: Arc::new(MockBatchClassifier::new()),
        scheduler: Arc::new(MockScheduler::new()),
        bucket: "test-bucket".to_string(),
        service_base_url: "http://svc.test".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    threads: HashMap<i64, Thread>,
    posts: Vec<Post>,
    jobs: HashMap<String, Job>,
    levels: Vec<SentimentSummary>,
    playbooks: Vec<Playbook>,
    marked: HashSet<String>,
}

#[derive(Default)]
pub struct MockPipelineStore {
    inner: Mutex<StoreInner>,
}

impl MockPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(
        self,
        thread_id: i64,
        display_name: &str,
        thread_type: &str,
        context: &str,
        platform_ids: &[&str],
    ) -> Self {
        self.inner.lock().unwrap().threads.insert(
            thread_id,
            Thread {
                thread_id,
                display_name: display_name.to_string(),
                thread_type: thread_type.to_string(),
                context: context.to_string(),
                instructions: String::new(),
                platform_ids: platform_ids.iter().map(|p| p.to_string()).collect(),
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        self
    }

    pub fn with_pending_post(
        self,
        thread_id: i64,
        post_id: &str,
        platform_id: &str,
        content: &str,
    ) -> Self {
        self.inner.lock().unwrap().posts.push(Post {
            post_id: post_id.to_string(),
            thread_id,
            platform_id: platform_id.to_string(),
            content: content.to_string(),
            content_type: None,
            status: "pending".to_string(),
            sentiment_score: None,
            sentiment_magnitude: None,
            sentiment_label: None,
            created_at: Utc::now(),
            scraped_at: Some(Utc::now()),
            sentiment_at: None,
        });
        self
    }

    pub fn with_scored_post(
        self,
        thread_id: i64,
        post_id: &str,
        platform_id: &str,
        score: f64,
        magnitude: f64,
        label: &str,
    ) -> Self {
        self.inner.lock().unwrap().posts.push(Post {
            post_id: post_id.to_string(),
            thread_id,
            platform_id: platform_id.to_string(),
            content: String::new(),
            content_type: None,
            status: "sentimented".to_string(),
            sentiment_score: Some(score),
            sentiment_magnitude: Some(magnitude),
            sentiment_label: Some(label.to_string()),
            created_at: Utc::now(),
            scraped_at: Some(Utc::now()),
            sentiment_at: Some(Utc::now()),
        });
        self
    }

    pub fn with_job(self, job_id: &str, thread_id: i64, platform_id: &str, keywords: &[&str]) -> Self {
        self.inner.lock().unwrap().jobs.insert(
            job_id.to_string(),
            Job {
                job_id: job_id.to_string(),
                thread_id,
                platform_id: platform_id.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                job_interval: Some("*/10 * * * *".to_string()),
                status: "pending".to_string(),
                created_at: Utc::now(),
            },
        );
        self
    }

    // --- inspectors ---

    pub fn post_status(&self, post_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.post_id == post_id)
            .map(|p| p.status.clone())
    }

    /// Stored levels for a (thread, platform) key, oldest first.
    pub fn level_history(&self, thread_id: i64, platform_id: &str) -> Vec<f64> {
        self.inner
            .lock()
            .unwrap()
            .levels
            .iter()
            .filter(|s| s.thread_id == thread_id && s.platform_id == platform_id)
            .map(|s| s.sentiment_level)
            .collect()
    }

    pub fn marked_blob_count(&self) -> usize {
        self.inner.lock().unwrap().marked.len()
    }

    pub fn job_row(&self, job_id: &str) -> Option<Job> {
        self.inner.lock().unwrap().jobs.get(job_id).cloned()
    }

    pub fn latest_playbook_row(&self, thread_id: i64) -> Option<Playbook> {
        self.inner
            .lock()
            .unwrap()
            .playbooks
            .iter()
            .rev()
            .find(|p| p.thread_id == thread_id)
            .cloned()
    }

    pub fn playbook_count(&self, thread_id: i64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .playbooks
            .iter()
            .filter(|p| p.thread_id == thread_id)
            .count()
    }

    /// Mean normalized level over the trailing one-hour window anchored at
    /// the newest scored post. Mirrors the SQL aggregate.
    fn window(posts: &[&Post]) -> Option<f64> {
        let newest = posts.iter().filter_map(|p| p.sentiment_at).max()?;
        let cutoff = newest - Duration::hours(1);
        let in_window: Vec<f64> = posts
            .iter()
            .filter(|p| p.sentiment_at.map(|t| t >= cutoff).unwrap_or(false))
            .map(|p| {
                normalized_level(
                    p.sentiment_score.unwrap_or(0.0),
                    p.sentiment_magnitude.unwrap_or(0.0),
                )
            })
            .collect();
        if in_window.is_empty() {
            None
        } else {
            Some(in_window.iter().sum::<f64>() / in_window.len() as f64)
        }
    }
}

fn scored(p: &Post) -> bool {
    p.status == "sentimented" || p.status == "generated"
}

#[async_trait]
impl PipelineStore for MockPipelineStore {
    async fn thread_by_id(&self, thread_id: i64) -> Result<Option<Thread>> {
        Ok(self.inner.lock().unwrap().threads.get(&thread_id).cloned())
    }

    async fn insert_thread(&self, thread: NewThread) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.threads.keys().max().copied().unwrap_or(0) + 1;
        inner.threads.insert(
            id,
            Thread {
                thread_id: id,
                display_name: thread.display_name,
                thread_type: thread.thread_type,
                context: thread.context,
                instructions: thread.instructions,
                platform_ids: thread.platform_ids,
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        Ok(id)
    }

    async fn update_thread(&self, thread_id: i64, thread: NewThread) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        match inner.threads.get_mut(&thread_id) {
            Some(row) => {
                row.display_name = thread.display_name;
                row.thread_type = thread.thread_type;
                row.context = thread.context;
                row.instructions = thread.instructions;
                row.platform_ids = thread.platform_ids;
                row.updated_at = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn platforms(&self) -> Result<Vec<Platform>> {
        Ok(["google-news", "google-search", "instagram", "twitter"]
            .iter()
            .map(|id| Platform {
                platform_id: id.to_string(),
                secret: None,
                endpoint: None,
                created_at: Utc::now(),
                updated_at: None,
            })
            .collect())
    }

    async fn insert_post(&self, post: NewPost) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.posts.iter().any(|p| p.post_id == post.post_id) {
            return Err(anyhow!("duplicate post id {}", post.post_id));
        }
        let id = post.post_id.clone();
        inner.posts.push(Post {
            post_id: post.post_id,
            thread_id: post.thread_id,
            platform_id: post.platform_id,
            content: post.content,
            content_type: post.content_type,
            status: "pending".to_string(),
            sentiment_score: None,
            sentiment_magnitude: None,
            sentiment_label: None,
            created_at: Utc::now(),
            scraped_at: post.scraped_at,
            sentiment_at: None,
        });
        Ok(id)
    }

    async fn pending_posts(&self, thread_id: i64, limit: i64) -> Result<Vec<Post>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id && p.status == "pending")
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn apply_sentiments(&self, updates: &[SentimentUpdate]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut updated = 0u64;
        for u in updates {
            if let Some(post) = inner
                .posts
                .iter_mut()
                .find(|p| p.post_id == u.post_id && p.status == "pending")
            {
                post.sentiment_score = Some(u.score);
                post.sentiment_magnitude = Some(u.magnitude);
                post.sentiment_label = Some(u.label.clone());
                post.status = "sentimented".to_string();
                post.sentiment_at = Some(Utc::now());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn top_posts(&self, thread_id: i64, rank: PostRank, limit: i64) -> Result<Vec<Post>> {
        let inner = self.inner.lock().unwrap();
        let mut posts: Vec<Post> = inner
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id && scored(p))
            .cloned()
            .collect();
        match rank {
            PostRank::Best => posts.sort_by(|a, b| {
                b.sentiment_score
                    .partial_cmp(&a.sentiment_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            PostRank::Worst => posts.sort_by(|a, b| {
                a.sentiment_score
                    .partial_cmp(&b.sentiment_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            PostRank::Neutral => {
                posts.retain(|p| p.sentiment_label.as_deref() == Some("neutral"));
                posts.sort_by(|a, b| b.sentiment_at.cmp(&a.sentiment_at));
            }
        }
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn label_counts(&self, thread_id: i64) -> Result<LabelCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = LabelCounts::default();
        for p in inner.posts.iter().filter(|p| p.thread_id == thread_id && scored(p)) {
            match p.sentiment_label.as_deref() {
                Some("positive") => counts.positive += 1,
                Some("negative") => counts.negative += 1,
                Some("neutral") => counts.neutral += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn window_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        let inner = self.inner.lock().unwrap();
        let posts: Vec<&Post> = inner
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id && p.platform_id == platform_id && scored(p))
            .collect();
        Ok(Self::window(&posts))
    }

    async fn overall_window_level(&self, thread_id: i64) -> Result<Option<f64>> {
        let inner = self.inner.lock().unwrap();
        let posts: Vec<&Post> = inner
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id && scored(p))
            .collect();
        Ok(Self::window(&posts))
    }

    async fn latest_level(&self, thread_id: i64, platform_id: &str) -> Result<Option<f64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .levels
            .iter()
            .rev()
            .find(|s| s.thread_id == thread_id && s.platform_id == platform_id)
            .map(|s| s.sentiment_level))
    }

    async fn insert_level(&self, thread_id: i64, platform_id: &str, level: f64) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.levels.len() as i64 + 1;
        inner.levels.push(SentimentSummary {
            sentiment_id: id,
            thread_id,
            platform_id: platform_id.to_string(),
            sentiment_level: level,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn latest_by_platform(&self, thread_id: i64) -> Result<Vec<(String, f64)>> {
        let inner = self.inner.lock().unwrap();
        let mut latest: HashMap<String, f64> = HashMap::new();
        for s in inner.levels.iter().filter(|s| s.thread_id == thread_id) {
            latest.insert(s.platform_id.clone(), s.sentiment_level);
        }
        let mut rows: Vec<(String, f64)> = latest.into_iter().collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    async fn levels_in_range(
        &self,
        thread_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentSummary>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .levels
            .iter()
            .filter(|s| s.thread_id == thread_id && s.created_at >= start && s.created_at <= end)
            .cloned()
            .collect())
    }

    async fn insert_playbook(&self, playbook: NewPlaybook) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.playbooks.len() as i64 + 1;
        inner.playbooks.push(Playbook {
            playbook_id: id,
            display_name: playbook.display_name,
            thread_id: playbook.thread_id,
            assessment: playbook.assessment,
            plan: playbook.plan,
            created_at: Utc::now(),
            updated_at: None,
        });
        Ok(id)
    }

    async fn latest_playbook(&self, thread_id: i64) -> Result<Option<Playbook>> {
        Ok(self.latest_playbook_row(thread_id))
    }

    async fn job_by_id(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.inner.lock().unwrap().jobs.get(job_id).cloned())
    }

    async fn jobs_by_thread(&self, thread_id: i64) -> Result<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.thread_id == thread_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.platform_id.cmp(&b.platform_id));
        Ok(jobs)
    }

    async fn insert_job(&self, job: NewJob) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.jobs.contains_key(&job.job_id) {
            return Err(anyhow!("duplicate job id {}", job.job_id));
        }
        let id = job.job_id.clone();
        inner.jobs.insert(
            id.clone(),
            Job {
                job_id: job.job_id,
                thread_id: job.thread_id,
                platform_id: job.platform_id,
                keywords: job.keywords,
                job_interval: Some(job.job_interval),
                status: job.status,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_job_keywords(&self, job_id: &str, keywords: &[String]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get_mut(job_id) {
            Some(job) => {
                job.keywords = keywords.to_vec();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_blob_if_absent(&self, blob_name: &str, _ops_id: &str) -> Result<bool> {
        Ok(self.inner.lock().unwrap().marked.insert(blob_name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Model clients
// ---------------------------------------------------------------------------

pub struct MockClassifier {
    score: f64,
    magnitude: f64,
    fail_on: Option<String>,
}

impl MockClassifier {
    pub fn returning(score: f64, magnitude: f64) -> Self {
        Self {
            score,
            magnitude,
            fail_on: None,
        }
    }

    /// Fail analysis for any content containing the marker.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }
}

#[async_trait]
impl SentimentClassifier for MockClassifier {
    async fn analyze(&self, text: &str) -> Result<Sentiment> {
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(anyhow!("classifier refused input"));
            }
        }
        Ok(Sentiment {
            score: self.score,
            magnitude: self.magnitude,
        })
    }
}

/// Scripted generator: pops one canned response per call and records every
/// (system, prompt) pair it saw.
pub struct MockGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportGenerator for MockGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left"))
    }
}

pub struct MockBatchClassifier {
    submissions: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl MockBatchClassifier {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn submissions(&self) -> Vec<(String, String)> {
        self.submissions.lock().unwrap().clone()
    }
}

impl Default for MockBatchClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchClassifier for MockBatchClassifier {
    async fn submit(&self, input_uri: &str, output_prefix: &str) -> Result<BatchJob> {
        if self.fail {
            return Err(anyhow!("batch service unavailable"));
        }
        self.submissions
            .lock()
            .unwrap()
            .push((input_uri.to_string(), output_prefix.to_string()));
        Ok(BatchJob {
            name: "batchPredictionJobs/123".to_string(),
            state: BatchJobState::Pending,
        })
    }

    async fn status(&self, job_name: &str) -> Result<BatchJob> {
        Ok(BatchJob {
            name: job_name.to_string(),
            state: BatchJobState::Succeeded,
        })
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct MockScheduler {
    created: Mutex<Vec<TriggerSpec>>,
    fail: bool,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn created(&self) -> Vec<TriggerSpec> {
        self.created.lock().unwrap().clone()
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerClient for MockScheduler {
    async fn create_trigger(&self, spec: &TriggerSpec) -> Result<String> {
        if self.fail {
            return Err(anyhow!("scheduler unavailable"));
        }
        self.created.lock().unwrap().push(spec.clone());
        Ok(spec.name.clone())
    }
}
