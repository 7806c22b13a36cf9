// Reqwest client for a GCS-style JSON/media API.

use async_trait::async_trait;

use crate::error::BlobError;
use crate::BlobStore;

pub struct GcsClient {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    token: String,
}

impl GcsClient {
    pub fn new(base_url: &str, bucket: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token: token.to_string(),
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            encode_object_name(name)
        )
    }
}

/// Percent-encode an object name for use as a path segment or query value.
/// Everything outside the RFC 3986 unreserved set is encoded, so names with
/// `&`, `=`, or `+` cannot corrupt a query string.
fn encode_object_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(b as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

#[async_trait]
impl BlobStore for GcsClient {
    async fn upload(&self, name: &str, content: &[u8]) -> anyhow::Result<String> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            encode_object_name(name)
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .body(content.to_vec())
            .send()
            .await
            .map_err(BlobError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(name.to_string())
    }

    async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}?alt=media", self.object_url(name));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(BlobError::from)?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(BlobError::NotFound(name.to_string()).into());
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(resp.bytes().await.map_err(BlobError::from)?.to_vec())
    }

    async fn exists(&self, name: &str) -> anyhow::Result<bool> {
        let resp = self
            .http
            .get(&self.object_url(name))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(BlobError::from)?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(false);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(true)
    }
}
