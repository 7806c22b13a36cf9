// Blob storage behind one trait. The pipeline stores batch-scoring input
// under `to_be_process/`, scored output under `processed/`, and a durable
// append-only issue log; the prefix is the visible stage marker.

pub mod error;
pub mod gcs;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use error::{BlobError, Result};
pub use gcs::GcsClient;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryBlobStore;

use anyhow::Result as AnyResult;
use async_trait::async_trait;

/// Prefix for batch input files awaiting classification.
pub const TO_BE_PROCESS_PREFIX: &str = "to_be_process/";

/// Prefix for scored output files.
pub const PROCESSED_PREFIX: &str = "processed/";

/// Append-only log of events that arrived but produced nothing.
pub const UNKNOWN_ISSUES_LOG: &str = "unknown-issues.txt";

/// `gs://bucket/name` location string for batch job submission.
pub fn gs_uri(bucket: &str, name: &str) -> String {
    format!("gs://{bucket}/{name}")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, replacing any existing content. Returns the blob name.
    async fn upload(&self, name: &str, content: &[u8]) -> AnyResult<String>;

    /// Read a blob's full content.
    async fn download(&self, name: &str) -> AnyResult<Vec<u8>>;

    async fn exists(&self, name: &str) -> AnyResult<bool>;

    /// Append one line to a text blob, creating it if missing. Read-modify-
    /// write, not atomic; the log is best-effort by design.
    async fn append_line(&self, name: &str, line: &str) -> AnyResult<()> {
        let mut content = if self.exists(name).await? {
            self.download(name).await?
        } else {
            Vec::new()
        };
        content.extend_from_slice(line.as_bytes());
        content.push(b'\n');
        self.upload(name, &content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gs_uri_joins_bucket_and_name() {
        assert_eq!(
            gs_uri("analysis", "to_be_process/1-20250101.jsonl"),
            "gs://analysis/to_be_process/1-20250101.jsonl"
        );
    }

    #[tokio::test]
    async fn append_line_creates_and_extends() {
        let store = MemoryBlobStore::new();
        store.append_line(UNKNOWN_ISSUES_LOG, "first").await.unwrap();
        store.append_line(UNKNOWN_ISSUES_LOG, "second").await.unwrap();
        let content = store.download(UNKNOWN_ISSUES_LOG).await.unwrap();
        assert_eq!(String::from_utf8(content).unwrap(), "first\nsecond\n");
    }
}
