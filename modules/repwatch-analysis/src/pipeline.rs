// Completion handler for scored-result artifacts. A storage event for a
// `processed/` blob drives everything downstream: post updates, per-platform
// and overall level gates, playbook generation on an overall change, and a
// wake poke for follow-on work. The dedup ledger makes redelivered events
// no-ops.

use std::collections::BTreeMap;

use tracing::{info, warn};

use ai_client::{parse_response_line, SentimentRecord};
use blob_client::{BlobStore, PROCESSED_PREFIX, UNKNOWN_ISSUES_LOG};
use repwatch_common::{PlatformId, RepwatchError, Result};
use repwatch_store::SentimentUpdate;

use crate::traits::PipelineStore;

use crate::aggregator::SentimentAggregator;
use crate::context::PipelineContext;
use crate::dedup::DedupGuard;
use crate::playbook::PlaybookGenerator;
use crate::wake::{analysis_url, WakeClient};

/// Prefix of artifacts written by the synchronous scoring path. Their lines
/// are bare sentiment records; everything else under `processed/` is batch
/// output in the provider envelope.
const NLP_ARTIFACT_PREFIX: &str = "processed/nlp-analysis-";

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The event was already handled by an earlier delivery.
    Duplicated,
    /// The event produced no usable records; logged and dropped.
    EmptyRun,
    /// Records were applied.
    Done {
        updated: u64,
        playbook_id: Option<i64>,
    },
}

pub struct Pipeline {
    ctx: PipelineContext,
    aggregator: SentimentAggregator,
    dedup: DedupGuard,
    playbooks: PlaybookGenerator,
    wake: WakeClient,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let aggregator = SentimentAggregator::new(&ctx);
        let dedup = DedupGuard::new(ctx.store.clone());
        let playbooks = PlaybookGenerator::new(&ctx);
        Self {
            ctx,
            aggregator,
            dedup,
            playbooks,
            wake: WakeClient::new(),
        }
    }

    pub fn aggregator(&self) -> &SentimentAggregator {
        &self.aggregator
    }

    pub fn playbooks(&self) -> &PlaybookGenerator {
        &self.playbooks
    }

    /// Handle one storage finalize event.
    pub async fn handle_storage_event(&self, bucket: &str, name: &str) -> Result<CompletionOutcome> {
        if bucket != self.ctx.bucket {
            warn!(bucket, name, "Event for a foreign bucket, ignoring");
            return Ok(CompletionOutcome::EmptyRun);
        }
        if self.dedup.already_processed(name).await? {
            return Ok(CompletionOutcome::Duplicated);
        }
        if !name.starts_with(PROCESSED_PREFIX) {
            info!(name, "Not a scored-result artifact, ignoring");
            return Ok(CompletionOutcome::EmptyRun);
        }

        let nlp = name.starts_with(NLP_ARTIFACT_PREFIX);
        let content = self
            .ctx
            .blobs
            .download(name)
            .await
            .map_err(|e| RepwatchError::Blob(e.to_string()))?;
        let text = String::from_utf8_lossy(&content);
        let records = parse_artifact(&text, nlp);
        if records.is_empty() {
            warn!(name, "Artifact yielded no sentiment records");
            self.ctx
                .blobs
                .append_line(UNKNOWN_ISSUES_LOG, name)
                .await
                .map_err(|e| RepwatchError::Blob(e.to_string()))?;
            return Ok(CompletionOutcome::EmptyRun);
        }

        // One artifact normally covers one thread, but nothing guarantees
        // it; group so the gates stay correct either way.
        let mut by_thread: BTreeMap<i64, Vec<SentimentUpdate>> = BTreeMap::new();
        for record in records {
            let platform = platform_for(&record);
            by_thread
                .entry(record.thread_id)
                .or_default()
                .push(SentimentUpdate {
                    post_id: record.content_id,
                    platform_id: platform,
                    score: record.sentiment.score,
                    magnitude: record.sentiment.magnitude,
                    label: record.sentiment.label,
                });
        }

        let mut updated = 0u64;
        let mut playbook_id = None;
        for (thread_id, updates) in by_thread {
            updated += self.ctx.store.apply_sentiments(&updates).await?;

            let mut platforms: Vec<&str> = updates.iter().map(|u| u.platform_id.as_str()).collect();
            platforms.sort_unstable();
            platforms.dedup();
            for platform in platforms {
                self.aggregator.level_gate(thread_id, Some(platform)).await?;
            }

            let overall = self.aggregator.level_gate(thread_id, None).await?;
            if overall.changed() {
                if let Some(id) = self.playbooks.generate(thread_id).await? {
                    playbook_id = Some(id);
                }
            }

            // Poke our own analysis endpoint so any posts scraped while this
            // run was in flight get picked up without waiting for a cron tick.
            self.wake
                .wake(&analysis_url(&self.ctx.service_base_url, thread_id, nlp))
                .await;
        }

        info!(name, updated, ?playbook_id, "Completion pass finished");
        Ok(CompletionOutcome::Done {
            updated,
            playbook_id,
        })
    }
}

/// Parse artifact lines into sentiment records. Malformed lines are logged
/// and skipped; one bad line never discards the rest of the file.
fn parse_artifact(text: &str, nlp: bool) -> Vec<SentimentRecord> {
    let mut records = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let parsed = if nlp {
            serde_json::from_str::<SentimentRecord>(line)
                .map(Some)
                .map_err(anyhow::Error::from)
        } else {
            parse_response_line(line).map_err(anyhow::Error::from)
        };
        match parsed {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping malformed artifact line"),
        }
    }
    records
}

/// Platform for a record: the post-id prefix wins, the payload's own
/// platform_id is the fallback for foreign id shapes.
fn platform_for(record: &SentimentRecord) -> String {
    PlatformId::from_post_id(&record.content_id)
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| record.platform_id.clone())
}
