// Cron trigger management. Ingestion jobs run on a schedule owned by an
// external scheduler service; we only create triggers pointing back at our
// own ingestion endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use repwatch_common::RepwatchError;

/// One cron trigger to create: fires an HTTP POST at `target_url` on
/// `schedule`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerSpec {
    pub name: String,
    pub schedule: String,
    pub target_url: String,
}

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Create the trigger; returns the scheduler's name for it.
    async fn create_trigger(&self, spec: &TriggerSpec) -> anyhow::Result<String>;
}

pub struct HttpSchedulerClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSchedulerClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    name: String,
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn create_trigger(&self, spec: &TriggerSpec) -> anyhow::Result<String> {
        let url = format!("{}/v1/triggers", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| RepwatchError::Scheduler(e.to_string()))?
            .error_for_status()
            .map_err(|e| RepwatchError::Scheduler(e.to_string()))?;
        let body: TriggerResponse = response
            .json()
            .await
            .map_err(|e| RepwatchError::Scheduler(e.to_string()))?;
        info!(trigger = %body.name, schedule = %spec.schedule, "Created cron trigger");
        Ok(body.name)
    }
}
