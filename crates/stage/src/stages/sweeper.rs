// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sweeper: kills cancelled WorkSpecs via each queue's sweeper plug-in, then
//! deletes WorkSpec + JobSpec rows that are terminal and past the retention
//! window. A failing `kill_worker` call retries until an attempt cap, at
//! which point the row is marked `unreachable` and kept for audit instead
//! of being deleted.

use crate::base::{Stage, StageError};
use crate::plugin::{resolve_for_queue, NoopSweeper, PluginRegistry, SweeperPlugin};
use harv_core::{Clock, WorkSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::sync::Arc;

const KILLABLE: &[WorkSpecStatus] = &[WorkSpecStatus::Cancelled, WorkSpecStatus::KillFailed];
const SWEEPABLE: &[WorkSpecStatus] = &[WorkSpecStatus::Finished, WorkSpecStatus::Failed, WorkSpecStatus::Missed];

pub struct Sweeper<C: Clock> {
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    registry: PluginRegistry<dyn SweeperPlugin>,
    default_plugin: Arc<dyn SweeperPlugin>,
    clock: C,
    owner: String,
    lease_ms: u64,
    limit: usize,
    kill_attempt_cap: u32,
    retention_ms: u64,
}

impl<C: Clock> Sweeper<C> {
    pub fn new(
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        registry: PluginRegistry<dyn SweeperPlugin>,
        clock: C,
        owner: String,
        lease_ms: u64,
        limit: usize,
        kill_attempt_cap: u32,
        retention_ms: u64,
    ) -> Self {
        Self { store, mapper, registry, default_plugin: Arc::new(NoopSweeper), clock, owner, lease_ms, limit, kill_attempt_cap, retention_ms }
    }

    fn delete_work_and_jobs(&self, work: &harv_core::WorkSpec) {
        for job_id in &work.job_ids {
            self.store.delete_job(job_id);
        }
        self.store.delete_work(&work.worker_id);
    }
}

impl<C: Clock> Stage for Sweeper<C> {
    const NAME: &'static str = "sweeper";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();

        let to_kill = self.store.claim_work(KILLABLE, &self.owner, now, self.lease_ms, self.limit);
        for mut work in to_kill {
            let plugin = resolve_for_queue(&self.mapper, &work.queue_name, "sweeper", &self.registry, &self.default_plugin);
            let result = plugin.kill_worker(&work);
            if result.ok {
                let sweep = plugin.sweep_worker(&work);
                if sweep.ok {
                    self.delete_work_and_jobs(&work);
                } else {
                    work.status = WorkSpecStatus::Failed;
                    self.store.update_work(work)?;
                }
                continue;
            }

            work.kill_attempts += 1;
            tracing::warn!(worker_id = %work.worker_id, attempt = work.kill_attempts, diag = %result.diag, "kill_worker failed");
            work.status = if work.kill_attempts >= self.kill_attempt_cap { WorkSpecStatus::Unreachable } else { WorkSpecStatus::KillFailed };
            self.store.update_work(work)?;
        }

        let to_sweep = self.store.claim_work(SWEEPABLE, &self.owner, now, self.lease_ms, self.limit);
        for work in to_sweep {
            if now.saturating_sub(work.monitor_time_ms) < self.retention_ms {
                self.store.release_work(&work.worker_id);
                continue;
            }
            let plugin = resolve_for_queue(&self.mapper, &work.queue_name, "sweeper", &self.registry, &self.default_plugin);
            let result = plugin.sweep_worker(&work);
            if result.ok {
                self.delete_work_and_jobs(&work);
            } else {
                tracing::warn!(worker_id = %work.worker_id, diag = %result.diag, "sweep_worker failed, retrying next cycle");
                self.store.release_work(&work.worker_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::VerbResult;
    use harv_core::WorkSpec;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mapper_with_plugin(class: &str) -> Arc<QueueConfigMapper> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json!({"Q1": {"sweeper": {"module": "m", "class": class}}}).to_string().as_bytes()).unwrap();
        Arc::new(QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap())
    }

    struct AlwaysFailsKill;
    impl SweeperPlugin for AlwaysFailsKill {
        fn kill_worker(&self, _work: &harv_core::WorkSpec) -> VerbResult {
            VerbResult::failed("timeout")
        }
        fn sweep_worker(&self, _work: &harv_core::WorkSpec) -> VerbResult {
            VerbResult::ok()
        }
    }

    #[test]
    fn finished_work_past_retention_is_deleted_with_its_jobs() {
        let store = Arc::new(Store::new());
        let mut work = WorkSpec::new("Q1", "ap1", 0);
        work.status = WorkSpecStatus::Finished;
        work.monitor_time_ms = 0;
        let job = harv_core::JobSpec::new(harv_core::PandaId(1), "Q1", json!({}));
        work.job_ids.push(job.job_id.clone());
        store.insert_job(job);
        store.insert_work(work);

        let mut stage = Sweeper::new(
            Arc::clone(&store),
            mapper_with_plugin("Noop"),
            PluginRegistry::new(),
            harv_core::FakeClock::new(),
            "swp-1".into(),
            5_000,
            10,
            3,
            0,
        );
        stage.execute().unwrap();

        assert!(store.work_by_queue("Q1").is_empty());
        assert!(store.jobs_by_queue("Q1").is_empty());
    }

    #[test]
    fn kill_failure_retries_then_becomes_unreachable_after_the_cap() {
        let store = Arc::new(Store::new());
        let mut work = WorkSpec::new("Q1", "ap1", 0);
        work.status = WorkSpecStatus::Cancelled;
        store.insert_work(work);

        let mut registry: PluginRegistry<dyn SweeperPlugin> = PluginRegistry::new();
        registry.register("Broken", |_| Arc::new(AlwaysFailsKill));
        let mapper = mapper_with_plugin("Broken");
        let clock = harv_core::FakeClock::new();

        let mut stage = Sweeper::new(Arc::clone(&store), mapper, registry, clock.clone(), "swp-1".into(), 1, 10, 2, 0);

        stage.execute().unwrap();
        assert_eq!(store.work_by_queue("Q1")[0].status, WorkSpecStatus::KillFailed);

        clock.advance_ms(10_000);
        stage.execute().unwrap();
        assert_eq!(store.work_by_queue("Q1")[0].status, WorkSpecStatus::Unreachable);
        assert!(!store.work_by_queue("Q1").is_empty(), "unreachable rows are kept, not deleted");
    }
}
