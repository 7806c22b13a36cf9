// Reqwest client for the GCP-style model surface: synchronous sentiment
// analysis, one-shot content generation, and batch prediction jobs over
// blob storage.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AiError, Result};
use crate::traits::{BatchClassifier, ReportGenerator, SentimentClassifier};
use crate::types::{BatchJob, BatchJobState, Sentiment};

pub struct GcpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    batch_model_id: String,
}

impl GcpClient {
    pub fn new(base_url: &str, api_key: &str, model_id: &str, batch_model_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model_id: model_id.to_string(),
            batch_model_id: batch_model_id.to_string(),
        }
    }

    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }
}

#[derive(Deserialize)]
struct SentimentResponse {
    #[serde(rename = "documentSentiment")]
    document_sentiment: DocumentSentiment,
}

#[derive(Deserialize)]
struct DocumentSentiment {
    score: f64,
    magnitude: f64,
}

#[async_trait]
impl SentimentClassifier for GcpClient {
    async fn analyze(&self, text: &str) -> anyhow::Result<Sentiment> {
        let url = format!("{}/v2/documents:analyzeSentiment", self.base_url);
        let body = json!({
            "document": { "content": text, "type": "PLAIN_TEXT" },
            "encodingType": "UTF8",
        });
        let value = self.post_json(&url, body).await?;
        let parsed: SentimentResponse =
            serde_json::from_value(value).map_err(AiError::from)?;
        Ok(Sentiment {
            score: parsed.document_sentiment.score,
            magnitude: parsed.document_sentiment.magnitude,
        })
    }
}

#[async_trait]
impl ReportGenerator for GcpClient {
    async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/v1/models/{}:generateContent",
            self.base_url, self.model_id
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "system_instruction": { "role": "system", "parts": [{ "text": system }] },
        });
        let value = self.post_json(&url, body).await?;
        let text = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AiError::Parse("generation response has no text".to_string()))?;
        Ok(text.to_string())
    }
}

#[async_trait]
impl BatchClassifier for GcpClient {
    async fn submit(&self, input_uri: &str, output_prefix: &str) -> anyhow::Result<BatchJob> {
        let url = format!("{}/v1/batchPredictionJobs", self.base_url);
        let body = json!({
            "displayName": format!("repwatch-batch-{}", self.batch_model_id),
            "model": self.batch_model_id,
            "inputConfig": {
                "instancesFormat": "jsonl",
                "gcsSource": { "uris": [input_uri] },
            },
            "outputConfig": {
                "predictionsFormat": "jsonl",
                "gcsDestination": { "outputUriPrefix": output_prefix },
            },
        });
        let value = self.post_json(&url, body).await?;
        job_from_value(&value)
    }

    async fn status(&self, job_name: &str) -> anyhow::Result<BatchJob> {
        let url = format!("{}/v1/{}", self.base_url, job_name);
        let resp = self.http.get(&url).bearer_auth(&self.api_key).send().await
            .map_err(AiError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        let value: serde_json::Value = resp.json().await.map_err(AiError::from)?;
        job_from_value(&value)
    }
}

fn job_from_value(value: &serde_json::Value) -> anyhow::Result<BatchJob> {
    let name = value["name"]
        .as_str()
        .ok_or_else(|| AiError::Parse("batch job response has no name".to_string()))?;
    let state = value["state"].as_str().unwrap_or("JOB_STATE_PENDING");
    Ok(BatchJob {
        name: name.to_string(),
        state: BatchJobState::from_provider(state),
    })
}
