// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`Communicator`] for stage and supervisor tests.

use crate::client::{CommandDirective, Communicator, EventRecord, JobPayload, JobStatusDiff, TransientRemoteError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Default)]
pub struct FakeCommunicator {
    jobs_by_queue: Mutex<std::collections::HashMap<String, VecDeque<JobPayload>>>,
    reported: Mutex<Vec<JobStatusDiff>>,
    commands: Mutex<VecDeque<CommandDirective>>,
    cache: Mutex<std::collections::HashMap<String, serde_json::Value>>,
    events: Mutex<Vec<EventRecord>>,
}

impl FakeCommunicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_jobs(&self, queue_name: &str, jobs: Vec<JobPayload>) {
        self.jobs_by_queue.lock().entry(queue_name.to_string()).or_default().extend(jobs);
    }

    pub fn seed_command(&self, directive: CommandDirective) {
        self.commands.lock().push_back(directive);
    }

    pub fn seed_cache(&self, key: &str, value: serde_json::Value) {
        self.cache.lock().insert(key.to_string(), value);
    }

    pub fn reported_diffs(&self) -> Vec<JobStatusDiff> {
        self.reported.lock().clone()
    }

    pub fn pushed_events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Communicator for FakeCommunicator {
    async fn fetch_jobs(&self, queue_name: &str, max_jobs: u32) -> Result<Vec<JobPayload>, TransientRemoteError> {
        let mut by_queue = self.jobs_by_queue.lock();
        let queue = by_queue.entry(queue_name.to_string()).or_default();
        let n = (max_jobs as usize).min(queue.len());
        Ok(queue.drain(..n).collect())
    }

    async fn report_job_status(&self, diffs: &[JobStatusDiff]) -> Result<Vec<u64>, TransientRemoteError> {
        let ids = diffs.iter().map(|d| d.panda_id).collect();
        self.reported.lock().extend(diffs.iter().cloned());
        Ok(ids)
    }

    async fn poll_commands(&self) -> Result<Vec<CommandDirective>, TransientRemoteError> {
        Ok(self.commands.lock().drain(..).collect())
    }

    async fn fetch_cache_document(&self, key: &str) -> Result<serde_json::Value, TransientRemoteError> {
        Ok(self.cache.lock().get(key).cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn push_events(&self, events: &[EventRecord]) -> Result<(), TransientRemoteError> {
        self.events.lock().extend(events.iter().cloned());
        Ok(())
    }
}
