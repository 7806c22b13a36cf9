// Search keyword generation for ingestion jobs. Twitter gets one API v2
// query string; Google-family and Instagram get a flat keyword list parsed
// from structured model output.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use ai_client::{strip_code_fences, ReportGenerator};
use repwatch_common::{PlatformId, RepwatchError, Result};

use crate::prompts;

#[derive(Debug, Deserialize)]
struct KeywordSet {
    primary_keywords: Vec<String>,
    secondary_keywords: Vec<String>,
}

pub struct KeywordBuilder {
    generator: Arc<dyn ReportGenerator>,
}

impl KeywordBuilder {
    pub fn new(generator: Arc<dyn ReportGenerator>) -> Self {
        Self { generator }
    }

    /// Build the search terms for one (platform, thread) pair from the
    /// thread's context and instructions.
    pub async fn build(
        &self,
        platform: PlatformId,
        context: &str,
        instructions: &str,
    ) -> Result<Vec<String>> {
        let keywords = match platform {
            PlatformId::Twitter => {
                let prompt = prompts::twitter_query_prompt(context, instructions);
                let raw = self
                    .generator
                    .generate("", &prompt)
                    .await
                    .map_err(|e| RepwatchError::Generation(e.to_string()))?;
                vec![strip_code_fences(&raw).trim().to_string()]
            }
            _ => {
                let prompt = prompts::google_keywords_prompt(context, instructions);
                let raw = self
                    .generator
                    .generate("", &prompt)
                    .await
                    .map_err(|e| RepwatchError::Generation(e.to_string()))?;
                let set: KeywordSet = serde_json::from_str(strip_code_fences(&raw))
                    .map_err(|e| RepwatchError::Generation(e.to_string()))?;
                let mut all = set.primary_keywords;
                all.extend(set.secondary_keywords);
                all
            }
        };
        info!(platform = %platform, count = keywords.len(), "Built search keywords");
        Ok(keywords)
    }
}
