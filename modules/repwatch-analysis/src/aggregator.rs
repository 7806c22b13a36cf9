// Sentiment scoring and level aggregation. Two scoring paths exist: the
// synchronous classifier (small runs, low latency) and the batch classifier
// (large runs, results land in blob storage). Both converge on the same
// `processed/` artifacts so the completion handler stays path-agnostic.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use ai_client::{
    BatchClassifier, BatchJob, BatchRequestLine, SentimentClassifier, SentimentFields,
    SentimentRecord,
};
use blob_client::{gs_uri, BlobStore, PROCESSED_PREFIX, TO_BE_PROCESS_PREFIX};
use repwatch_common::sentiment::label_for_score;
use repwatch_common::{RepwatchError, Result};

use crate::context::PipelineContext;
use crate::prompts::SENTIMENT_SYSTEM_INSTRUCTION;
use crate::traits::PipelineStore;

/// Pseudo-platform key for the cross-platform level of a thread. Stored in
/// the same summary table as per-platform levels; the playbook trigger
/// watches this key only.
pub const OVERALL_PLATFORM: &str = "overall";

/// Upper bound on pending posts picked up by one scoring pass.
const PENDING_BATCH_LIMIT: i64 = 1000;

/// Result of comparing a freshly computed window level against the last
/// stored one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelOutcome {
    /// The aggregation window held no scored posts; nothing is stored.
    NoData,
    /// Same level as the last stored row; nothing is stored.
    Unchanged(f64),
    /// New level, now persisted as the latest summary row.
    Changed(f64),
}

impl LevelOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, LevelOutcome::Changed(_))
    }
}

/// Outcome of a synchronous scoring pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScorePass {
    pub scored: usize,
    pub skipped: usize,
    /// Blob name of the written result artifact, when any post was scored.
    pub artifact: Option<String>,
}

pub struct SentimentAggregator {
    store: Arc<dyn PipelineStore>,
    blobs: Arc<dyn BlobStore>,
    classifier: Arc<dyn SentimentClassifier>,
    batch: Arc<dyn BatchClassifier>,
    bucket: String,
}

impl SentimentAggregator {
    pub fn new(ctx: &PipelineContext) -> Self {
        Self {
            store: ctx.store.clone(),
            blobs: ctx.blobs.clone(),
            classifier: ctx.classifier.clone(),
            batch: ctx.batch.clone(),
            bucket: ctx.bucket.clone(),
        }
    }

    /// Score the thread's pending posts with the synchronous classifier and
    /// write the results as a `processed/` artifact. Post rows are NOT
    /// updated here: the artifact's storage event drives the completion
    /// handler, exactly as with batch results, so both paths share one
    /// commit point.
    pub async fn score_pending(&self, thread_id: i64) -> Result<ScorePass> {
        let pending = self
            .store
            .pending_posts(thread_id, PENDING_BATCH_LIMIT)
            .await?;
        if pending.is_empty() {
            info!(thread_id, "No pending posts to score");
            return Ok(ScorePass {
                scored: 0,
                skipped: 0,
                artifact: None,
            });
        }

        let mut lines = Vec::with_capacity(pending.len());
        let mut skipped = 0usize;
        for post in &pending {
            match self.classifier.analyze(&post.content).await {
                Ok(sentiment) => {
                    let record = SentimentRecord {
                        content_id: post.post_id.clone(),
                        thread_id: post.thread_id,
                        platform_id: post.platform_id.clone(),
                        sentiment: SentimentFields {
                            score: sentiment.score,
                            magnitude: sentiment.magnitude,
                            label: label_for_score(sentiment.score).as_str().to_string(),
                        },
                    };
                    lines.push(serde_json::to_string(&record).map_err(anyhow::Error::from)?);
                }
                Err(e) => {
                    warn!(post_id = %post.post_id, error = %e, "Classifier failed for post, skipping");
                    skipped += 1;
                }
            }
        }

        if lines.is_empty() {
            warn!(thread_id, skipped, "Scoring pass produced no results");
            return Ok(ScorePass {
                scored: 0,
                skipped,
                artifact: None,
            });
        }

        let name = format!(
            "{}nlp-analysis-{}.jsonl",
            PROCESSED_PREFIX,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        self.blobs
            .upload(&name, lines.join("\n").as_bytes())
            .await
            .map_err(|e| RepwatchError::Blob(e.to_string()))?;
        info!(thread_id, artifact = %name, scored = lines.len(), skipped, "Scoring pass complete");

        Ok(ScorePass {
            scored: lines.len(),
            skipped,
            artifact: Some(name),
        })
    }

    /// Submit the thread's pending posts as an asynchronous batch
    /// classification job. Returns None when there is nothing to score.
    /// Results arrive later under `processed/` via the storage webhook.
    pub async fn submit_batch(&self, thread_id: i64) -> Result<Option<BatchJob>> {
        let pending = self
            .store
            .pending_posts(thread_id, PENDING_BATCH_LIMIT)
            .await?;
        if pending.is_empty() {
            info!(thread_id, "No pending posts for batch submission");
            return Ok(None);
        }

        let mut lines = Vec::with_capacity(pending.len());
        for post in &pending {
            let line = BatchRequestLine::for_post(
                &post.post_id,
                post.thread_id,
                &post.platform_id,
                &post.content,
                SENTIMENT_SYSTEM_INSTRUCTION,
            );
            lines.push(serde_json::to_string(&line).map_err(anyhow::Error::from)?);
        }

        let name = format!(
            "{}{}-{}.jsonl",
            TO_BE_PROCESS_PREFIX,
            thread_id,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        self.blobs
            .upload(&name, lines.join("\n").as_bytes())
            .await
            .map_err(|e| RepwatchError::Blob(e.to_string()))?;

        let job = self
            .batch
            .submit(
                &gs_uri(&self.bucket, &name),
                &gs_uri(&self.bucket, PROCESSED_PREFIX),
            )
            .await
            .map_err(|e| RepwatchError::Classifier(e.to_string()))?;
        info!(thread_id, job = %job.name, posts = pending.len(), "Batch classification submitted");

        Ok(Some(job))
    }

    /// Recompute the trailing-window level for one platform of a thread
    /// (or the whole thread when `platform` is None) and persist it only if
    /// it differs from the last stored value. Exact equality is the gate:
    /// the window aggregate is deterministic over the same rows, so a
    /// repeated run reproduces the stored value bit-for-bit.
    pub async fn level_gate(&self, thread_id: i64, platform: Option<&str>) -> Result<LevelOutcome> {
        let current = match platform {
            Some(p) => self.store.window_level(thread_id, p).await?,
            None => self.store.overall_window_level(thread_id).await?,
        };
        let Some(level) = current else {
            return Ok(LevelOutcome::NoData);
        };

        let key = platform.unwrap_or(OVERALL_PLATFORM);
        let previous = self.store.latest_level(thread_id, key).await?;
        if previous == Some(level) {
            info!(thread_id, platform = key, level, "Sentiment level unchanged");
            return Ok(LevelOutcome::Unchanged(level));
        }

        self.store.insert_level(thread_id, key, level).await?;
        info!(
            thread_id,
            platform = key,
            level,
            previous = ?previous,
            "Sentiment level changed"
        );
        Ok(LevelOutcome::Changed(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_close, test_context, MockBatchClassifier, MockClassifier, MockPipelineStore,
    };
    use blob_client::MemoryBlobStore;

    fn aggregator(
        store: Arc<MockPipelineStore>,
        blobs: Arc<MemoryBlobStore>,
        classifier: Arc<MockClassifier>,
        batch: Arc<MockBatchClassifier>,
    ) -> SentimentAggregator {
        let mut ctx = test_context(store);
        ctx.blobs = blobs;
        ctx.classifier = classifier;
        ctx.batch = batch;
        SentimentAggregator::new(&ctx)
    }

    #[tokio::test]
    async fn score_pending_writes_processed_artifact() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_pending_post(1, "tw-a", "twitter", "love it")
                .with_pending_post(1, "tw-b", "twitter", "hate it"),
        );
        let blobs = Arc::new(MemoryBlobStore::new());
        let agg = aggregator(
            store.clone(),
            blobs.clone(),
            Arc::new(MockClassifier::returning(0.4, 0.3)),
            Arc::new(MockBatchClassifier::new()),
        );

        let pass = agg.score_pending(1).await.unwrap();
        assert_eq!(pass.scored, 2);
        assert_eq!(pass.skipped, 0);

        let name = pass.artifact.unwrap();
        assert!(name.starts_with("processed/nlp-analysis-"));
        let content = blobs.download(&name).await.unwrap();
        let text = String::from_utf8(content).unwrap();
        let records: Vec<SentimentRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content_id, "tw-a");
        assert_eq!(records[0].sentiment.label, "positive");

        // Rows stay pending until the artifact's storage event is handled.
        assert_eq!(store.post_status("tw-a").unwrap(), "pending");
    }

    #[tokio::test]
    async fn classifier_failure_skips_post() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_pending_post(1, "tw-a", "twitter", "fine")
                .with_pending_post(1, "tw-b", "twitter", "poison"),
        );
        let blobs = Arc::new(MemoryBlobStore::new());
        let agg = aggregator(
            store,
            blobs,
            Arc::new(MockClassifier::returning(0.2, 0.1).failing_on("poison")),
            Arc::new(MockBatchClassifier::new()),
        );

        let pass = agg.score_pending(1).await.unwrap();
        assert_eq!(pass.scored, 1);
        assert_eq!(pass.skipped, 1);
    }

    #[tokio::test]
    async fn score_pending_with_nothing_pending_is_a_noop() {
        let agg = aggregator(
            Arc::new(MockPipelineStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            Arc::new(MockBatchClassifier::new()),
        );
        let pass = agg.score_pending(9).await.unwrap();
        assert_eq!(pass.scored, 0);
        assert!(pass.artifact.is_none());
    }

    #[tokio::test]
    async fn submit_batch_uploads_input_and_submits_job() {
        let store = Arc::new(
            MockPipelineStore::new().with_pending_post(3, "ig-a", "instagram", "meh"),
        );
        let blobs = Arc::new(MemoryBlobStore::new());
        let batch = Arc::new(MockBatchClassifier::new());
        let agg = aggregator(
            store,
            blobs.clone(),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            batch.clone(),
        );

        let job = agg.submit_batch(3).await.unwrap().unwrap();
        assert_eq!(job.name, "batchPredictionJobs/123");

        let submissions = batch.submissions();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].0.starts_with("gs://test-bucket/to_be_process/3-"));
        assert_eq!(submissions[0].1, "gs://test-bucket/processed/");

        let input = blobs.names();
        assert_eq!(input.len(), 1);
        assert!(input[0].starts_with("to_be_process/3-"));
    }

    #[tokio::test]
    async fn batch_service_failure_is_a_classifier_error() {
        let store = Arc::new(
            MockPipelineStore::new().with_pending_post(3, "ig-a", "instagram", "meh"),
        );
        let agg = aggregator(
            store,
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            Arc::new(MockBatchClassifier::failing()),
        );
        let err = agg.submit_batch(3).await.unwrap_err();
        assert!(matches!(err, RepwatchError::Classifier(_)));
    }

    #[tokio::test]
    async fn submit_batch_without_pending_posts_returns_none() {
        let batch = Arc::new(MockBatchClassifier::new());
        let agg = aggregator(
            Arc::new(MockPipelineStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            batch.clone(),
        );
        assert!(agg.submit_batch(3).await.unwrap().is_none());
        assert!(batch.submissions().is_empty());
    }

    #[tokio::test]
    async fn level_gate_with_empty_window_stores_nothing() {
        let store = Arc::new(MockPipelineStore::new());
        let agg = aggregator(
            store.clone(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            Arc::new(MockBatchClassifier::new()),
        );
        assert_eq!(agg.level_gate(1, None).await.unwrap(), LevelOutcome::NoData);
        assert!(store.level_history(1, OVERALL_PLATFORM).is_empty());
    }

    #[tokio::test]
    async fn level_gate_stores_changed_and_skips_unchanged() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_scored_post(1, "tw-a", "twitter", 0.3, 0.1, "positive")
                .with_scored_post(1, "tw-b", "twitter", 0.3, 0.1, "positive"),
        );
        let agg = aggregator(
            store.clone(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            Arc::new(MockBatchClassifier::new()),
        );

        // 0.7*0.3 + 0.3*0.1 = 0.24 → 62.0 on the percent scale.
        let first = agg.level_gate(1, None).await.unwrap();
        let LevelOutcome::Changed(level) = first else {
            panic!("expected Changed, got {first:?}");
        };
        assert_close(level, 62.0);
        assert_eq!(store.level_history(1, OVERALL_PLATFORM).len(), 1);

        // Same rows, same aggregate: the gate holds the second run back.
        let second = agg.level_gate(1, None).await.unwrap();
        assert!(matches!(second, LevelOutcome::Unchanged(_)));
        assert_eq!(store.level_history(1, OVERALL_PLATFORM).len(), 1);
    }

    #[tokio::test]
    async fn level_gate_tracks_platforms_independently() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_scored_post(1, "tw-a", "twitter", 0.3, 0.1, "positive")
                .with_scored_post(1, "gn-a", "google-news", -0.5, 0.6, "negative"),
        );
        let agg = aggregator(
            store.clone(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MockClassifier::returning(0.0, 0.0)),
            Arc::new(MockBatchClassifier::new()),
        );

        assert!(agg.level_gate(1, Some("twitter")).await.unwrap().changed());
        assert!(agg
            .level_gate(1, Some("google-news"))
            .await
            .unwrap()
            .changed());
        assert_close(store.level_history(1, "twitter")[0], 62.0);
        // 0.7*-0.5 + 0.3*0.6 = -0.17 → 41.5.
        assert_close(store.level_history(1, "google-news")[0], 41.5);
    }
}
