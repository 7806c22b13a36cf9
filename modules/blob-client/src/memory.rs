// In-memory blob store for tests. No network, no Docker.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BlobError;
use crate::BlobStore;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a blob, e.g. a batch output file a test webhook will read.
    pub fn with_blob(self, name: &str, content: &[u8]) -> Self {
        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
        self
    }

    /// Names of all stored blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, name: &str, content: &[u8]) -> anyhow::Result<String> {
        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
        Ok(name.to_string())
    }

    async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(name.to_string()).into())
    }

    async fn exists(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(name))
    }
}
