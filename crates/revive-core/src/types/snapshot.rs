//! Ledger snapshot metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest snapshot of the managed cluster as reported by the ledger backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// When the snapshot was produced
    pub timestamp: DateTime<Utc>,
    /// Snapshot ordinal
    pub ordinal: u64,
    /// Snapshot hash
    pub hash: String,
}

impl SnapshotInfo {
    /// Whole minutes between the snapshot and `now`, floored and never negative.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_minutes().max(0)
    }
}

/// Latest global (network-wide) snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSnapshotInfo {
    /// Snapshot ordinal
    pub ordinal: u64,
    /// Snapshot hash
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn age_is_floored_minutes() {
        let now = Utc::now();
        let info = SnapshotInfo {
            timestamp: now - Duration::seconds(599),
            ordinal: 1,
            hash: "h".into(),
        };
        assert_eq!(info.age_minutes(now), 9);
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let now = Utc::now();
        let info = SnapshotInfo {
            timestamp: now + Duration::minutes(2),
            ordinal: 1,
            hash: "h".into(),
        };
        assert_eq!(info.age_minutes(now), 0);
    }
}
