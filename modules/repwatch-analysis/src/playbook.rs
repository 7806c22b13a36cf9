// Playbook generation. Runs only when a thread's overall sentiment level
// changes; assembles the evidence (top content by rank, label distribution,
// latest level), prompts the generator, validates the JSON shape, and
// persists the report. A malformed model response is logged and dropped,
// never stored.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use ai_client::{strip_code_fences, ReportGenerator};
use repwatch_common::{RepwatchError, Result};
use repwatch_store::{NewPlaybook, PostRank};

use crate::aggregator::OVERALL_PLATFORM;
use crate::context::PipelineContext;
use crate::prompts;
use crate::traits::PipelineStore;

/// How many posts of each rank feed the prompt.
const TOP_CONTENT_LIMIT: i64 = 100;

/// Top-level keys a generated report must carry to be persisted.
const REQUIRED_KEYS: [&str; 5] = [
    "report_name",
    "summary",
    "severity_assessment",
    "incident_categorization",
    "recommendations",
];

pub struct PlaybookGenerator {
    store: Arc<dyn PipelineStore>,
    generator: Arc<dyn ReportGenerator>,
}

impl PlaybookGenerator {
    pub fn new(ctx: &PipelineContext) -> Self {
        Self {
            store: ctx.store.clone(),
            generator: ctx.generator.clone(),
        }
    }

    /// Generate and persist a playbook for the thread. Returns the new
    /// playbook id, or None when the thread is missing or the model output
    /// fails validation.
    pub async fn generate(&self, thread_id: i64) -> Result<Option<i64>> {
        let Some(thread) = self.store.thread_by_id(thread_id).await? else {
            warn!(thread_id, "Playbook requested for unknown thread");
            return Ok(None);
        };

        let (best, worst, neutral, counts, level) = futures::try_join!(
            self.store.top_posts(thread_id, PostRank::Best, TOP_CONTENT_LIMIT),
            self.store.top_posts(thread_id, PostRank::Worst, TOP_CONTENT_LIMIT),
            self.store.top_posts(thread_id, PostRank::Neutral, TOP_CONTENT_LIMIT),
            self.store.label_counts(thread_id),
            self.store.latest_level(thread_id, OVERALL_PLATFORM),
        )?;

        let prompt = prompts::playbook_prompt(&thread, &counts, level, &best, &neutral, &worst);
        let raw = self
            .generator
            .generate(prompts::PR_EXPERT_SYSTEM, &prompt)
            .await
            .map_err(|e| RepwatchError::Generation(e.to_string()))?;

        let report: Value = match serde_json::from_str(strip_code_fences(&raw)) {
            Ok(v) => v,
            Err(e) => {
                warn!(thread_id, error = %e, "Playbook response is not valid JSON, dropping");
                return Ok(None);
            }
        };
        if let Some(missing) = REQUIRED_KEYS.iter().find(|k| report.get(**k).is_none()) {
            warn!(thread_id, key = missing, "Playbook response missing required key, dropping");
            return Ok(None);
        }

        let display_name = report
            .get("report_name")
            .and_then(Value::as_str)
            .unwrap_or("Reputation report")
            .to_string();
        let playbook = NewPlaybook {
            thread_id,
            display_name,
            assessment: json!({
                "summary": report["summary"],
                "severity_assessment": report["severity_assessment"],
                "incident_categorization": report["incident_categorization"],
            }),
            plan: report["recommendations"].clone(),
        };

        let id = self.store.insert_playbook(playbook).await?;
        info!(thread_id, playbook_id = id, "Playbook stored");
        Ok(Some(id))
    }
}
