// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stager: stages outputs via each queue's stager plug-in for finished
//! work, then releases the claim (the sweeper owns final row removal).

use crate::base::{Stage, StageError};
use crate::plugin::{resolve_for_queue, NoopStager, PluginRegistry, StagerPlugin};
use harv_core::{Clock, WorkSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::sync::Arc;

const CLAIMABLE: &[WorkSpecStatus] = &[WorkSpecStatus::Finished, WorkSpecStatus::Failed];

pub struct Stager<C: Clock> {
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    registry: PluginRegistry<dyn StagerPlugin>,
    default_plugin: Arc<dyn StagerPlugin>,
    clock: C,
    owner: String,
    lease_ms: u64,
    limit: usize,
}

impl<C: Clock> Stager<C> {
    pub fn new(
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        registry: PluginRegistry<dyn StagerPlugin>,
        clock: C,
        owner: String,
        lease_ms: u64,
        limit: usize,
    ) -> Self {
        Self { store, mapper, registry, default_plugin: Arc::new(NoopStager), clock, owner, lease_ms, limit }
    }
}

impl<C: Clock> Stage for Stager<C> {
    const NAME: &'static str = "stager";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let claimed = self.store.claim_work(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);

        for work in claimed {
            let plugin = resolve_for_queue(&self.mapper, &work.queue_name, "stager", &self.registry, &self.default_plugin);
            let result = plugin.stage_out(&work);
            if !result.ok {
                tracing::warn!(worker_id = %work.worker_id, diag = %result.diag, "output staging failed, retrying next cycle");
            }
            // Staging doesn't move the row off Finished/Failed; it just
            // unlocks it so the sweeper can claim it next.
            self.store.release_work(&work.worker_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harv_core::{FakeClock, WorkSpec};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mapper_with_one_queue() -> Arc<QueueConfigMapper> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json!({"Q1": {}}).to_string().as_bytes()).unwrap();
        Arc::new(QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap())
    }

    #[test]
    fn staging_releases_the_claim_for_the_sweeper() {
        let store = Arc::new(Store::new());
        let mut work = WorkSpec::new("Q1", "ap1", 0);
        work.status = WorkSpecStatus::Finished;
        store.insert_work(work);

        let mut stage =
            Stager::new(Arc::clone(&store), mapper_with_one_queue(), PluginRegistry::new(), FakeClock::new(), "stg-1".into(), 5_000, 10);
        stage.execute().unwrap();

        let reclaimed = store.claim_work(CLAIMABLE, "sweeper-1", 1, 5_000, 10);
        assert_eq!(reclaimed.len(), 1, "stager must release the row it claimed");
    }
}
