// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Propagator: syncs each claimed JobSpec's status to its linked WorkSpec,
//! reports the diff to the dispatcher, and marks confirmed-terminal jobs
//! `Swept` — "confirmed" ready for the sweeper to physically remove.

use crate::base::{Stage, StageError};
use harv_comm::{CommunicatorPool, JobStatusDiff};
use harv_core::{Clock, JobSpecStatus, WorkSpecStatus};
use harv_storage::Store;
use std::sync::Arc;
use tokio::runtime::Handle;

const CLAIMABLE: &[JobSpecStatus] =
    &[JobSpecStatus::Submitted, JobSpecStatus::Running, JobSpecStatus::Finished, JobSpecStatus::Failed, JobSpecStatus::Cancelled];

fn job_status_for(work_status: WorkSpecStatus) -> Option<JobSpecStatus> {
    match work_status {
        WorkSpecStatus::Submitted => Some(JobSpecStatus::Submitted),
        WorkSpecStatus::Running => Some(JobSpecStatus::Running),
        WorkSpecStatus::Finished => Some(JobSpecStatus::Finished),
        WorkSpecStatus::Failed | WorkSpecStatus::Missed | WorkSpecStatus::KillFailed | WorkSpecStatus::Unreachable => {
            Some(JobSpecStatus::Failed)
        }
        WorkSpecStatus::Cancelled => Some(JobSpecStatus::Cancelled),
        WorkSpecStatus::Undefined => None,
    }
}

pub struct Propagator<C: Clock> {
    comm: Arc<CommunicatorPool>,
    store: Arc<Store>,
    clock: C,
    rt: Handle,
    owner: String,
    lease_ms: u64,
    limit: usize,
}

impl<C: Clock> Propagator<C> {
    pub fn new(comm: Arc<CommunicatorPool>, store: Arc<Store>, clock: C, rt: Handle, owner: String, lease_ms: u64, limit: usize) -> Self {
        Self { comm, store, clock, rt, owner, lease_ms, limit }
    }
}

impl<C: Clock> Stage for Propagator<C> {
    const NAME: &'static str = "propagator";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let mut jobs = self.store.claim_jobs(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);
        if jobs.is_empty() {
            return Ok(());
        }

        for job in &mut jobs {
            if let Some(worker_id) = &job.worker_id {
                if let Some(work) = self.store.get_work(worker_id) {
                    if let Some(target) = job_status_for(work.status) {
                        job.advance_to(target);
                    }
                }
            }
        }

        let diffs: Vec<JobStatusDiff> = jobs
            .iter()
            .map(|j| JobStatusDiff { panda_id: j.panda_id.0, status: j.status.to_string(), core_count: None })
            .collect();

        let lease = self.comm.lease();
        let confirmed = self.rt.block_on(lease.report_job_status(&diffs))?;
        drop(lease);

        for mut job in jobs {
            if confirmed.contains(&job.panda_id.0) && job.status.is_terminal() {
                job.advance_to(JobSpecStatus::Swept);
            }
            self.store.update_job(job)?;
        }
        Ok(())
    }
}
