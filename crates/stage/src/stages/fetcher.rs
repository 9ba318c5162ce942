// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job fetcher: pulls new jobs from the dispatcher for each queue under its
//! demand-cap and inserts them as new JobSpecs.

use crate::base::{Stage, StageError};
use harv_comm::CommunicatorPool;
use harv_core::{JobSpec, JobSpecStatus, PandaId};
use harv_queue::QueueConfigMapper;
use harv_storage::Store;
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct JobFetcher {
    comm: Arc<CommunicatorPool>,
    store: Arc<Store>,
    mapper: Arc<QueueConfigMapper>,
    rt: Handle,
    demand_cap: u32,
}

impl JobFetcher {
    pub fn new(comm: Arc<CommunicatorPool>, store: Arc<Store>, mapper: Arc<QueueConfigMapper>, rt: Handle, demand_cap: u32) -> Self {
        Self { comm, store, mapper, rt, demand_cap }
    }

    fn outstanding(&self, queue_name: &str) -> u32 {
        self.store.jobs_by_queue(queue_name).iter().filter(|j| !j.status.is_terminal()).count() as u32
    }
}

impl Stage for JobFetcher {
    const NAME: &'static str = "job_fetcher";

    fn execute(&mut self) -> Result<(), StageError> {
        let lease = self.comm.lease();
        for queue_name in self.mapper.queue_names().cloned().collect::<Vec<_>>() {
            let outstanding = self.outstanding(&queue_name);
            if outstanding >= self.demand_cap {
                continue;
            }
            let need = self.demand_cap - outstanding;
            let payloads = self.rt.block_on(lease.fetch_jobs(&queue_name, need))?;
            for payload in payloads {
                let mut job = JobSpec::new(PandaId(payload.panda_id), queue_name.clone(), payload.payload);
                job.advance_to(JobSpecStatus::Fetched);
                self.store.insert_job(job);
            }
        }
        Ok(())
    }
}
