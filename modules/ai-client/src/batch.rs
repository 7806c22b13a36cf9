// Batch classification wire format. Each request line carries one post plus
// the few-shot system instruction; each response line wraps the model output,
// whose inner text is itself a JSON sentiment record.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AiError, Result};

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequestLine {
    pub request: BatchRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub top_k: u32,
}

impl BatchRequestLine {
    /// Build the request line for one post. The user content embeds the ids
    /// so the model can echo them back in its structured output.
    pub fn for_post(
        post_id: &str,
        thread_id: i64,
        platform_id: &str,
        content: &str,
        system_instruction: &str,
    ) -> Self {
        let text = format!(
            "Content_ID: {post_id}\nThread_ID: {thread_id}\nPlatform_ID: {platform_id}\nContent: {content}\nOutput:"
        );
        Self {
            request: BatchRequest {
                contents: vec![Content {
                    role: "user".to_string(),
                    parts: vec![Part { text }],
                }],
                system_instruction: Content {
                    role: "system".to_string(),
                    parts: vec![Part {
                        text: system_instruction.to_string(),
                    }],
                },
                generation_config: GenerationConfig { top_k: 5 },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponseLine {
    pub response: Option<BatchResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Content,
}

/// The inner JSON document the model produces for one post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentRecord {
    pub content_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub thread_id: i64,
    pub platform_id: String,
    pub sentiment: SentimentFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentFields {
    pub score: f64,
    pub magnitude: f64,
    pub label: String,
}

/// Models echo numeric ids back as strings often enough that we accept both.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Strip a markdown code fence (```json ... ```) wrapped around model output.
/// Returns the input unchanged when there is no fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse one response line into a sentiment record. Lines without a response
/// body (provider bookkeeping rows) yield Ok(None); malformed inner JSON is
/// an error the caller logs and skips.
pub fn parse_response_line(line: &str) -> Result<Option<SentimentRecord>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let envelope: BatchResponseLine = serde_json::from_str(line)?;
    let Some(response) = envelope.response else {
        return Ok(None);
    };
    let text = response
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.as_str())
        .ok_or_else(|| AiError::Parse("response line has no candidate text".to_string()))?;
    let record: SentimentRecord = serde_json::from_str(strip_code_fences(text))?;
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_response_line() {
        let inner = r#"```json
{"content_id": "tw-1", "thread_id": "7", "platform_id": "twitter",
 "sentiment": {"score": -0.5, "magnitude": 0.6, "label": "negative"}}
```"#;
        let line = serde_json::json!({
            "response": {
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": inner}]}}
                ]
            }
        })
        .to_string();

        let record = parse_response_line(&line).unwrap().unwrap();
        assert_eq!(record.content_id, "tw-1");
        assert_eq!(record.thread_id, 7);
        assert_eq!(record.sentiment.label, "negative");
    }

    #[test]
    fn line_without_response_is_skipped() {
        let line = r#"{"status": "processed"}"#;
        assert!(parse_response_line(line).unwrap().is_none());
        assert!(parse_response_line("   ").unwrap().is_none());
    }

    #[test]
    fn malformed_inner_json_is_an_error() {
        let line = serde_json::json!({
            "response": {
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": "not json"}]}}
                ]
            }
        })
        .to_string();
        assert!(parse_response_line(&line).is_err());
    }

    #[test]
    fn request_line_embeds_post_ids() {
        let line = BatchRequestLine::for_post("tw-9", 3, "twitter", "great phone", "score things");
        let text = &line.request.contents[0].parts[0].text;
        assert!(text.contains("Content_ID: tw-9"));
        assert!(text.contains("Thread_ID: 3"));
        assert!(text.contains("Platform_ID: twitter"));
        assert_eq!(line.request.generation_config.top_k, 5);
    }
}
