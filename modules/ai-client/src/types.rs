use serde::{Deserialize, Serialize};

/// Raw classifier output for one unit of text. The label is derived from the
/// score sign by the caller, not by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub magnitude: f64,
}

/// Handle for an asynchronous batch classification job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub name: String,
    pub state: BatchJobState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchJobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl BatchJobState {
    /// Map a provider state string onto our coarse lifecycle. Unknown
    /// in-flight states count as Running.
    pub fn from_provider(state: &str) -> Self {
        match state {
            "JOB_STATE_QUEUED" | "JOB_STATE_PENDING" => BatchJobState::Pending,
            "JOB_STATE_SUCCEEDED" => BatchJobState::Succeeded,
            "JOB_STATE_FAILED" | "JOB_STATE_CANCELLED" | "JOB_STATE_EXPIRED" => {
                BatchJobState::Failed
            }
            _ => BatchJobState::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchJobState::Succeeded | BatchJobState::Failed)
    }
}
