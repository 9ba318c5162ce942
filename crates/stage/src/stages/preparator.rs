// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preparator: stages inputs via each queue's preparator plug-in and
//! advances ready JobSpecs from `fetched` to `prepared`.

use crate::base::{Stage, StageError};
use crate::plugin::{resolve_for_queue, NoopPreparator, PluginRegistry, PreparatorPlugin};
use harv_core::{Clock, JobSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::sync::Arc;

const CLAIMABLE: &[JobSpecStatus] = &[JobSpecStatus::Fetched];

pub struct Preparator<C: Clock> {
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    registry: PluginRegistry<dyn PreparatorPlugin>,
    default_plugin: Arc<dyn PreparatorPlugin>,
    clock: C,
    owner: String,
    lease_ms: u64,
    limit: usize,
}

impl<C: Clock> Preparator<C> {
    pub fn new(
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        registry: PluginRegistry<dyn PreparatorPlugin>,
        clock: C,
        owner: String,
        lease_ms: u64,
        limit: usize,
    ) -> Self {
        Self { store, mapper, registry, default_plugin: Arc::new(NoopPreparator), clock, owner, lease_ms, limit }
    }
}

impl<C: Clock> Stage for Preparator<C> {
    const NAME: &'static str = "preparator";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let claimed = self.store.claim_jobs(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);

        for mut job in claimed {
            let plugin = resolve_for_queue(&self.mapper, &job.queue_name, "preparator", &self.registry, &self.default_plugin);
            let result = plugin.trigger_preparation(&job);
            if result.ok {
                job.advance_to(JobSpecStatus::Prepared);
                self.store.update_job(job)?;
            } else {
                tracing::warn!(job_id = %job.job_id, diag = %result.diag, "preparation failed, retrying next cycle");
                self.store.release_job(&job.job_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harv_core::{FakeClock, JobSpec, PandaId};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mapper_with_one_queue() -> Arc<QueueConfigMapper> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json!({"Q1": {}}).to_string().as_bytes()).unwrap();
        Arc::new(QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap())
    }

    #[test]
    fn default_noop_plugin_advances_fetched_jobs_to_prepared() {
        let store = Arc::new(Store::new());
        let mut job = JobSpec::new(PandaId(1), "Q1", json!({}));
        job.advance_to(JobSpecStatus::Fetched);
        store.insert_job(job);

        let mut stage =
            Preparator::new(Arc::clone(&store), mapper_with_one_queue(), PluginRegistry::new(), FakeClock::new(), "prep-1".into(), 5_000, 10);
        stage.execute().unwrap();

        assert_eq!(store.jobs_by_queue("Q1")[0].status, JobSpecStatus::Prepared);
    }
}
