// Event dedup guard. Storage-completion webhooks can be delivered more than
// once; the ledger insert is the commit point of the dedup decision, and a
// caller must not touch the event before this returns false.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use repwatch_common::Result;

use crate::traits::PipelineStore;

pub struct DedupGuard {
    store: Arc<dyn PipelineStore>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        Self { store }
    }

    /// True when this blob name was already handled — the caller must skip
    /// all further processing. False marks the name as ours and lets exactly
    /// one delivery through.
    pub async fn already_processed(&self, blob_name: &str) -> Result<bool> {
        let ops_id = format!("ops-{}", Uuid::new_v4());
        let inserted = self.store.mark_blob_if_absent(blob_name, &ops_id).await?;
        if inserted {
            info!(blob_name, "Marked blob as processing");
        } else {
            info!(blob_name, "Duplicate storage event, ignoring");
        }
        Ok(!inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPipelineStore;

    #[tokio::test]
    async fn first_delivery_passes_second_is_duplicate() {
        let store = Arc::new(MockPipelineStore::new());
        let guard = DedupGuard::new(store.clone());

        assert!(!guard
            .already_processed("processed/run-1.jsonl")
            .await
            .unwrap());
        assert!(guard
            .already_processed("processed/run-1.jsonl")
            .await
            .unwrap());
        assert_eq!(store.marked_blob_count(), 1);
    }

    #[tokio::test]
    async fn distinct_names_are_independent() {
        let store = Arc::new(MockPipelineStore::new());
        let guard = DedupGuard::new(store.clone());

        assert!(!guard.already_processed("processed/a.jsonl").await.unwrap());
        assert!(!guard.already_processed("processed/b.jsonl").await.unwrap());
        assert_eq!(store.marked_blob_count(), 2);
    }
}
