// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor: queries each non-terminal WorkSpec's back-end plug-in and
//! transitions its status.

use crate::base::{Stage, StageError};
use crate::plugin::{resolve_for_queue, MonitorPlugin, NoopMonitor, PluginRegistry};
use harv_core::{Clock, WorkSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::collections::HashMap;
use std::sync::Arc;

const CLAIMABLE: &[WorkSpecStatus] = &[WorkSpecStatus::Undefined, WorkSpecStatus::Submitted, WorkSpecStatus::Running];

pub struct Monitor<C: Clock> {
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    registry: PluginRegistry<dyn MonitorPlugin>,
    default_plugin: Arc<dyn MonitorPlugin>,
    clock: C,
    owner: String,
    lease_ms: u64,
    limit: usize,
}

impl<C: Clock> Monitor<C> {
    pub fn new(
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        registry: PluginRegistry<dyn MonitorPlugin>,
        clock: C,
        owner: String,
        lease_ms: u64,
        limit: usize,
    ) -> Self {
        Self { store, mapper, registry, default_plugin: Arc::new(NoopMonitor), clock, owner, lease_ms, limit }
    }
}

impl<C: Clock> Stage for Monitor<C> {
    const NAME: &'static str = "monitor";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let claimed = self.store.claim_work(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);
        if claimed.is_empty() {
            return Ok(());
        }

        let mut by_queue: HashMap<String, Vec<_>> = HashMap::new();
        for work in claimed {
            by_queue.entry(work.queue_name.clone()).or_default().push(work);
        }

        for (queue_name, mut batch) in by_queue {
            let plugin = resolve_for_queue(&self.mapper, &queue_name, "monitor", &self.registry, &self.default_plugin);
            let outcomes = plugin.check_workers(&batch);
            for (work, (result, new_status)) in batch.iter_mut().zip(outcomes) {
                if !result.ok {
                    tracing::warn!(worker_id = %work.worker_id, diag = %result.diag, "monitor plug-in call failed");
                    self.store.release_work(&work.worker_id);
                    continue;
                }
                work.status = new_status;
                work.monitor_time_ms = now;
                self.store.update_work(work.clone())?;
            }
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
    fn default_noop_plugin_marks_work_finished() {
        let store = Arc::new(Store::new());
        store.insert_work(WorkSpec::new("Q1", "ap1", 0));

        let mut stage =
            Monitor::new(Arc::clone(&store), mapper_with_one_queue(), PluginRegistry::new(), FakeClock::new(), "mon-1".into(), 5_000, 10);
        stage.execute().unwrap();

        let work = store.work_by_queue("Q1");
        assert_eq!(work[0].status, WorkSpecStatus::Finished);
    }
}
