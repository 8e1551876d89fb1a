//! Typed access to the persisted restart record.

use crate::context::RestartContext;
use crate::effects::RestartEffects;
use revive_core::types::{RestartEpisode, StoredRestartRecord};
use revive_core::{RestartRecord, RestartState, ReviveResult};

/// Loads, claims and advances the single restart record of a cluster.
pub struct RecordStore<'a, E: RestartEffects> {
    ctx: &'a RestartContext<E>,
}

impl<'a, E: RestartEffects> RecordStore<'a, E> {
    /// Create a store adapter bound to `ctx`.
    pub fn new(ctx: &'a RestartContext<E>) -> Self {
        Self { ctx }
    }

    /// The decoded record, `None` when nothing is stored.
    ///
    /// Unknown state or enum text surfaces as `CorruptRecord`.
    pub async fn load(&self) -> ReviveResult<Option<RestartRecord>> {
        Ok(self.load_raw().await?.map(|(_, record)| record))
    }

    /// The stored text form next to its decoding, for conditional replaces.
    async fn load_raw(&self) -> ReviveResult<Option<(StoredRestartRecord, RestartRecord)>> {
        let stored = self
            .ctx
            .effects()
            .load_record(self.ctx.cluster_id())
            .await?;
        match stored {
            Some(stored) => {
                let record = RestartRecord::try_from(stored.clone())?;
                Ok(Some((stored, record)))
            }
            None => Ok(None),
        }
    }

    /// Atomically open an episode.
    ///
    /// An episode-less NEW record is replaced only if it is still the one
    /// read here; an absent one is created only if still absent. Returns
    /// `None` when an episode is already open or another invocation won.
    pub async fn claim(&self, episode: RestartEpisode) -> ReviveResult<Option<RestartRecord>> {
        let effects = self.ctx.effects();
        let current = self.load_raw().await?;
        if let Some((_, existing)) = &current {
            if existing.is_in_flight() {
                tracing::warn!(state = %existing.state, "episode already open, not claiming");
                return Ok(None);
            }
        }

        let now = effects.now().await;
        let record = RestartRecord::claimed(self.ctx.cluster_id(), episode, now);
        let desired = StoredRestartRecord::from(&record);
        let won = match &current {
            Some((stored, _)) => effects.replace_record_if(stored, &desired).await?,
            None => effects.create_record_if_absent(&desired).await?,
        };

        if won {
            tracing::info!(
                cluster_id = %record.cluster_id,
                restart_type = %record.restart_type(),
                "restart episode claimed"
            );
            Ok(Some(record))
        } else {
            tracing::warn!(cluster_id = %record.cluster_id, "lost the race to claim the episode");
            Ok(None)
        }
    }

    /// Advance `record` to `next` and persist it.
    pub async fn transition(
        &self,
        record: &RestartRecord,
        next: RestartState,
    ) -> ReviveResult<RestartRecord> {
        let now = self.ctx.effects().now().await;
        let advanced = record.advance(next, now)?;
        self.ctx
            .effects()
            .save_record(&StoredRestartRecord::from(&advanced))
            .await?;
        tracing::info!(
            cluster_id = %advanced.cluster_id,
            from = %record.state,
            to = %advanced.state,
            "restart state changed"
        );
        Ok(advanced)
    }

    /// Remove the record, closing whatever episode it carried.
    pub async fn delete(&self) -> ReviveResult<()> {
        self.ctx
            .effects()
            .delete_record(self.ctx.cluster_id())
            .await?;
        tracing::info!(cluster_id = %self.ctx.cluster_id(), "restart record deleted");
        Ok(())
    }

    /// Close the episode of `record` by replacing it with a fresh NEW record.
    ///
    /// Only succeeds while the store still holds `record`; returns `false`
    /// when another invocation changed it in between, leaving its write
    /// untouched.
    pub async fn release(&self, record: &RestartRecord) -> ReviveResult<bool> {
        let effects = self.ctx.effects();
        let Some(stored) = effects.load_record(self.ctx.cluster_id()).await? else {
            return Ok(false);
        };
        // Compared in stored form, where timestamps are already truncated.
        if stored != StoredRestartRecord::from(record) {
            return Ok(false);
        }

        let fresh = RestartRecord::new(self.ctx.cluster_id(), effects.now().await);
        let released = effects
            .replace_record_if(&stored, &StoredRestartRecord::from(&fresh))
            .await?;
        if released {
            tracing::info!(cluster_id = %record.cluster_id, state = %record.state, "restart episode released");
        } else {
            tracing::warn!(cluster_id = %record.cluster_id, "record changed before release");
        }
        Ok(released)
    }
}
