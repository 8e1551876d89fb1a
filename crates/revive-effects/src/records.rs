//! File-backed restart record store.
//!
//! One pretty-printed JSON file per cluster. Writes go to a temporary file
//! first; overwrite renames it into place and conditional create hard-links
//! it, which fails atomically when the record already exists.
//!
//! Conditional replace holds `<cluster_id>.lock`, created exclusively, while
//! it compares and renames. A lock older than [`STALE_LOCK`] is left over
//! from a crashed process and is broken. Plain saves and deletes do not take
//! the lock: only the invocation that owns the open episode issues them.

use async_trait::async_trait;
use revive_core::effects::RestartRecordEffects;
use revive_core::types::StoredRestartRecord;
use revive_core::{ReviveError, ReviveResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Age after which a replace lock is considered abandoned.
pub const STALE_LOCK: Duration = Duration::from_secs(60);

/// Restart records as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Create a store in `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, cluster_id: &str) -> ReviveResult<PathBuf> {
        let valid = !cluster_id.is_empty()
            && cluster_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !cluster_id.starts_with('.');
        if !valid {
            return Err(ReviveError::invalid(format!(
                "cluster id '{cluster_id}' cannot be used as a record key"
            )));
        }
        Ok(self.dir.join(format!("{cluster_id}.json")))
    }

    /// Take the replace lock of `cluster_id`. `false` when someone else holds it.
    async fn lock(&self, cluster_id: &str) -> ReviveResult<bool> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ReviveError::storage(format!("failed to create record dir: {e}")))?;
        let path = self.lock_path(cluster_id);

        for _ in 0..2 {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(_) => return Ok(true),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path).await {
                        return Ok(false);
                    }
                    tracing::warn!(lock = %path.display(), "breaking stale record lock");
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Err(err) => {
                    return Err(ReviveError::storage(format!(
                        "failed to lock {}: {err}",
                        path.display()
                    )))
                }
            }
        }
        Ok(false)
    }

    fn lock_path(&self, cluster_id: &str) -> PathBuf {
        self.dir.join(format!("{cluster_id}.lock"))
    }

    async fn replace_locked(
        &self,
        path: &Path,
        expected: &StoredRestartRecord,
        record: &StoredRestartRecord,
    ) -> ReviveResult<bool> {
        if self.load_record(&expected.id).await?.as_ref() != Some(expected) {
            return Ok(false);
        }
        let temp = self.write_temp(record).await?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| ReviveError::storage(format!("failed to replace {}: {e}", path.display())))?;
        Ok(true)
    }

    async fn write_temp(&self, record: &StoredRestartRecord) -> ReviveResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ReviveError::storage(format!("failed to create record dir: {e}")))?;

        let temp = self.dir.join(format!(".{}.{}.tmp", record.id, Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| ReviveError::storage(format!("failed to write record: {e}")))?;
        Ok(temp)
    }
}

#[async_trait]
impl RestartRecordEffects for FileRecordStore {
    async fn load_record(&self, cluster_id: &str) -> ReviveResult<Option<StoredRestartRecord>> {
        let path = self.record_path(cluster_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    ReviveError::corrupt_record(format!("{}: {e}", path.display()))
                })?;
                Ok(Some(record))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ReviveError::storage(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    async fn create_record_if_absent(&self, record: &StoredRestartRecord) -> ReviveResult<bool> {
        let path = self.record_path(&record.id)?;
        let temp = self.write_temp(record).await?;

        let linked = tokio::fs::hard_link(&temp, &path).await;
        let _ = tokio::fs::remove_file(&temp).await;

        match linked {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(ReviveError::storage(format!(
                "failed to create {}: {err}",
                path.display()
            ))),
        }
    }

    async fn replace_record_if(
        &self,
        expected: &StoredRestartRecord,
        record: &StoredRestartRecord,
    ) -> ReviveResult<bool> {
        if expected.id != record.id {
            return Err(ReviveError::invalid("conditional replace across clusters"));
        }
        let path = self.record_path(&record.id)?;
        if !self.lock(&record.id).await? {
            tracing::debug!(cluster_id = %record.id, "record lock held elsewhere");
            return Ok(false);
        }

        let result = self.replace_locked(&path, expected, record).await;
        let _ = tokio::fs::remove_file(self.lock_path(&record.id)).await;
        result
    }

    async fn save_record(&self, record: &StoredRestartRecord) -> ReviveResult<()> {
        let path = self.record_path(&record.id)?;
        let temp = self.write_temp(record).await?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| ReviveError::storage(format!("failed to replace {}: {e}", path.display())))
    }

    async fn delete_record(&self, cluster_id: &str) -> ReviveResult<()> {
        let path = self.record_path(cluster_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ReviveError::storage(format!(
                "failed to delete {}: {err}",
                path.display()
            ))),
        }
    }
}

async fn is_stale(lock: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(lock).await else {
        return true;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, state: &str) -> StoredRestartRecord {
        StoredRestartRecord {
            id: id.to_string(),
            state: state.to_string(),
            restart_type: String::new(),
            restart_reason: String::new(),
            reference_node_ip: String::new(),
            individual_nodes_ips_with_ports: String::new(),
            updated_at: "2024-05-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_if_absent_only_wins_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path().join("records"));

        assert!(store
            .create_record_if_absent(&stored("cluster", "NEW"))
            .await
            .expect("create"));
        assert!(!store
            .create_record_if_absent(&stored("cluster", "READY"))
            .await
            .expect("second create"));

        let loaded = store.load_record("cluster").await.expect("load");
        assert_eq!(loaded.map(|r| r.state), Some("NEW".to_string()));
    }

    #[tokio::test]
    async fn save_overwrites_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());

        store.save_record(&stored("cluster", "NEW")).await.expect("save");
        store
            .save_record(&stored("cluster", "JOINING"))
            .await
            .expect("overwrite");
        assert_eq!(
            store.load_record("cluster").await.expect("load").map(|r| r.state),
            Some("JOINING".to_string())
        );

        store.delete_record("cluster").await.expect("delete");
        store.delete_record("cluster").await.expect("delete again");
        assert_eq!(store.load_record("cluster").await.expect("load"), None);
    }

    #[tokio::test]
    async fn no_temp_files_are_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());
        store
            .create_record_if_absent(&stored("cluster", "NEW"))
            .await
            .expect("create");
        store
            .create_record_if_absent(&stored("cluster", "NEW"))
            .await
            .expect("create");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cluster.json".to_string()]);
    }

    #[tokio::test]
    async fn replace_only_when_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());
        let fresh = stored("cluster", "NEW");
        store.save_record(&fresh).await.expect("save");

        let mut claimed = stored("cluster", "NEW");
        claimed.restart_type = "Full Cluster".to_string();
        assert!(store.replace_record_if(&fresh, &claimed).await.expect("replace"));

        // The record moved on; a replace based on the old read loses.
        let late = stored("cluster", "NEW");
        assert!(!store.replace_record_if(&fresh, &late).await.expect("replace"));
        assert_eq!(store.load_record("cluster").await.expect("load"), Some(claimed));
        assert!(!dir.path().join("cluster.lock").exists());
    }

    #[tokio::test]
    async fn held_lock_blocks_replace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());
        let fresh = stored("cluster", "NEW");
        store.save_record(&fresh).await.expect("save");
        std::fs::write(dir.path().join("cluster.lock"), "").expect("lock");

        assert!(!store
            .replace_record_if(&fresh, &stored("cluster", "READY"))
            .await
            .expect("replace"));
        assert_eq!(store.load_record("cluster").await.expect("load"), Some(fresh));
    }

    #[tokio::test]
    async fn replace_of_missing_record_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());
        assert!(!store
            .replace_record_if(&stored("cluster", "NEW"), &stored("cluster", "READY"))
            .await
            .expect("replace"));
        assert_eq!(store.load_record("cluster").await.expect("load"), None);
    }

    #[tokio::test]
    async fn unparsable_file_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("cluster.json"), "{not json").expect("write");
        let store = FileRecordStore::new(dir.path());
        assert!(matches!(
            store.load_record("cluster").await,
            Err(ReviveError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let store = FileRecordStore::new("/tmp/unused");
        assert!(store.load_record("../etc").await.is_err());
    }
}
