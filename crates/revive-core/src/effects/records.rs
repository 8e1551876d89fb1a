//! Durable restart record storage.

use crate::errors::ReviveResult;
use crate::types::StoredRestartRecord;
use async_trait::async_trait;

/// Single-item key-value store holding at most one record per cluster.
///
/// Handlers store the flat text form untouched; decoding and validation
/// happen above this trait.
#[async_trait]
pub trait RestartRecordEffects: Send + Sync {
    /// Read the record of `cluster_id`, `None` when absent.
    async fn load_record(&self, cluster_id: &str) -> ReviveResult<Option<StoredRestartRecord>>;

    /// Create the record only if none exists for its cluster.
    ///
    /// Returns `true` when this call created it and `false` when another
    /// record was already present. Must be atomic with respect to other
    /// callers of the same store.
    async fn create_record_if_absent(&self, record: &StoredRestartRecord) -> ReviveResult<bool>;

    /// Replace the record with `record` only if the stored one still equals
    /// `expected`.
    ///
    /// Returns `false` when the record changed or disappeared since
    /// `expected` was read. Must be atomic with respect to other callers of
    /// this method and of [`Self::create_record_if_absent`].
    async fn replace_record_if(
        &self,
        expected: &StoredRestartRecord,
        record: &StoredRestartRecord,
    ) -> ReviveResult<bool>;

    /// Overwrite (or create) the record.
    async fn save_record(&self, record: &StoredRestartRecord) -> ReviveResult<()>;

    /// Delete the record of `cluster_id`. Deleting an absent record succeeds.
    async fn delete_record(&self, cluster_id: &str) -> ReviveResult<()>;
}
