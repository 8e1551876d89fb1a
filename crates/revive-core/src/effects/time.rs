//! Wall-clock time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Wall-clock time and sleeping.
///
/// Every timestamp the engine persists and every pause it takes goes through
/// this trait, so tests can run hour-long episodes instantly.
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current UTC time.
    async fn now(&self) -> DateTime<Utc>;

    /// Suspend for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u64);
}
