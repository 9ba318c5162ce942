// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submitter: creates WorkSpecs for ready JobSpecs per queue and submits
//! them via each queue's submitter plug-in. A failed submit detours the
//! job through `submit_failed` back to `prepared` for retry, subject to an
//! attempt cap.

use crate::base::{Stage, StageError};
use crate::plugin::{resolve_for_queue, NoopSubmitter, PluginRegistry, SubmitterPlugin};
use harv_core::{Clock, JobSpecStatus};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::collections::HashMap;
use std::sync::Arc;

const CLAIMABLE: &[JobSpecStatus] = &[JobSpecStatus::Prepared];

pub struct Submitter<C: Clock> {
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    registry: PluginRegistry<dyn SubmitterPlugin>,
    default_plugin: Arc<dyn SubmitterPlugin>,
    clock: C,
    owner: String,
    lease_ms: u64,
    limit: usize,
    attempt_cap: u32,
}

impl<C: Clock> Submitter<C> {
    pub fn new(
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        registry: PluginRegistry<dyn SubmitterPlugin>,
        clock: C,
        owner: String,
        lease_ms: u64,
        limit: usize,
        attempt_cap: u32,
    ) -> Self {
        Self { store, mapper, registry, default_plugin: Arc::new(NoopSubmitter), clock, owner, lease_ms, limit, attempt_cap }
    }
}

impl<C: Clock> Stage for Submitter<C> {
    const NAME: &'static str = "submitter";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let claimed = self.store.claim_jobs(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);
        if claimed.is_empty() {
            return Ok(());
        }

        let mut by_queue: HashMap<String, Vec<_>> = HashMap::new();
        for job in claimed {
            by_queue.entry(job.queue_name.clone()).or_default().push(job);
        }

        for (queue_name, jobs) in by_queue {
            let plugin = resolve_for_queue(&self.mapper, &queue_name, "submitter", &self.registry, &self.default_plugin);
            let outcomes = plugin.submit_workers(&jobs);

            for (mut job, (result, work)) in jobs.into_iter().zip(outcomes) {
                job.advance_to(JobSpecStatus::Submitted);
                if result.ok {
                    job.worker_id = Some(work.worker_id.clone());
                    self.store.insert_work(work);
                } else {
                    job.submit_attempts += 1;
                    job.advance_to(JobSpecStatus::SubmitFailed);
                    tracing::warn!(
                        job_id = %job.job_id,
                        attempt = job.submit_attempts,
                        diag = %result.diag,
                        "submit failed"
                    );
                    if job.submit_attempts < self.attempt_cap {
                        job.advance_to(JobSpecStatus::Prepared);
                    }
                    // else: stays SubmitFailed permanently, kept for audit.
                }
                self.store.update_job(job)?;
            }
        }
        Ok(())
    }
}
