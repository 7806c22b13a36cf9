// Trait seams for model access. The pipeline never talks to a vendor API
// directly: it sees a synchronous classifier, a structured-report generator,
// and an asynchronous batch classifier over blob storage locations.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::error::AiError;
use crate::types::{BatchJob, BatchJobState, Sentiment};

/// Interval between batch-job status polls.
pub const BATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on status polls before `wait_for_batch` gives up with an
/// explicit timeout error. The loop must never block forever.
pub const BATCH_POLL_MAX_ITERATIONS: u32 = 120;

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Score a unit of text. score ∈ [-1,1], magnitude ∈ [0,1].
    async fn analyze(&self, text: &str) -> Result<Sentiment>;
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// One-shot text generation with a system preamble. Returns the raw
    /// model text; callers own parsing and validation.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait BatchClassifier: Send + Sync {
    /// Submit an asynchronous batch classification job reading the JSONL
    /// file at `input_uri` and writing results under `output_prefix`.
    async fn submit(&self, input_uri: &str, output_prefix: &str) -> Result<BatchJob>;

    /// Current state of a previously submitted job.
    async fn status(&self, job_name: &str) -> Result<BatchJob>;
}

/// Poll a batch job until it reaches a terminal state, bounded by
/// `max_iterations`. Completion normally arrives via the storage webhook;
/// this exists for callers that need to block on a job (tooling, tests).
pub async fn wait_for_batch(
    client: &dyn BatchClassifier,
    job: &BatchJob,
    interval: Duration,
    max_iterations: u32,
) -> Result<BatchJob> {
    let mut current = job.clone();
    for _ in 0..max_iterations {
        if current.state.is_terminal() {
            if current.state == BatchJobState::Failed {
                return Err(AiError::BatchFailed {
                    job: current.name.clone(),
                    state: format!("{:?}", current.state),
                }
                .into());
            }
            return Ok(current);
        }
        debug!(job = %current.name, state = ?current.state, "Batch job still in progress");
        tokio::time::sleep(interval).await;
        current = client.status(&current.name).await?;
    }
    Err(AiError::BatchTimeout {
        job: current.name,
        iterations: max_iterations,
    }
    .into())
}
