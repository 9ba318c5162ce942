// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event feeder: pushes granular event records for event-service workloads
//! — WorkSpecs whose queue mapping allows many jobs per worker, so progress
//! has to be reported per job rather than per worker.

use crate::base::{Stage, StageError};
use harv_comm::{CommunicatorPool, EventRecord};
use harv_core::{Clock, WorkSpecStatus};
use harv_queue::{MapType, QueueConfigMapper};
use harv_storage::Store;
use std::sync::Arc;
use tokio::runtime::Handle;

const CLAIMABLE: &[WorkSpecStatus] = &[WorkSpecStatus::Running, WorkSpecStatus::Finished];

pub struct EventFeeder<C: Clock> {
    comm: Arc<CommunicatorPool>,
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    clock: C,
    rt: Handle,
    owner: String,
    lease_ms: u64,
    limit: usize,
}

impl<C: Clock> EventFeeder<C> {
    pub fn new(
        comm: Arc<CommunicatorPool>,
        store: Arc<Store>,
        mapper: Arc<QueueConfigMapper>,
        clock: C,
        rt: Handle,
        owner: String,
        lease_ms: u64,
        limit: usize,
    ) -> Self {
        Self { comm, store, mapper, clock, rt, owner, lease_ms, limit }
    }
}

impl<C: Clock> Stage for EventFeeder<C> {
    const NAME: &'static str = "event_feeder";

    fn execute(&mut self) -> Result<(), StageError> {
        let now = self.clock.epoch_ms();
        let claimed = self.store.claim_work(CLAIMABLE, &self.owner, now, self.lease_ms, self.limit);

        let mut events = Vec::new();
        let mut relevant = Vec::new();
        for work in claimed {
            let is_event_service =
                self.mapper.get_queue(&work.queue_name).map(|q| q.map_type == MapType::ManyJobsPerWorker).unwrap_or(false);
            if !is_event_service {
                self.store.release_work(&work.worker_id);
                continue;
            }
            for job_id in &work.job_ids {
                events.push(EventRecord {
                    worker_id: work.worker_id.to_string(),
                    payload: serde_json::json!({"job_id": job_id.to_string(), "status": work.status.to_string()}),
                });
            }
            relevant.push(work);
        }

        if events.is_empty() {
            for work in relevant {
                self.store.release_work(&work.worker_id);
            }
            return Ok(());
        }

        let lease = self.comm.lease();
        let result = self.rt.block_on(lease.push_events(&events));
        drop(lease);
        for work in relevant {
            self.store.release_work(&work.worker_id);
        }
        result?;
        Ok(())
    }
}
