use sqlx::PgPool;

use crate::error::Result;

/// Write-once dedup ledger for storage-completion events. Presence of a blob
/// name means its event was handled; rows are never read back individually.
#[derive(Clone)]
pub struct MarkedBlobStore {
    pool: PgPool,
}

impl MarkedBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the blob name if absent. Returns true when this call won the
    /// insert (the event is ours to process), false when the name already
    /// existed. The primary-key conflict makes the check-then-insert atomic
    /// under concurrent duplicate delivery.
    pub async fn mark_if_absent(&self, blob_name: &str, ops_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO marked_blob (blob_name, ops_id)
            VALUES ($1, $2)
            ON CONFLICT (blob_name) DO NOTHING
            "#,
        )
        .bind(blob_name)
        .bind(ops_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
