// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row wrappers carrying the lock-owner/lease-deadline columns the claim
//! discipline needs, layered around the plain `harv-core` records.

use harv_core::{JobSpec, WorkSpec};
use serde::{Deserialize, Serialize};

/// A stored row plus the claim metadata the DB proxy pool manages.
///
/// `lock_owner`/`lease_deadline_ms` are never exposed on [`JobSpec`]/[`WorkSpec`]
/// themselves: every stage deals in plain records, and only the store's claim
/// operations see the lock columns, matching the "DB rows are the only shared
/// mutable state" ownership rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locked<T> {
    pub value: T,
    pub lock_owner: Option<String>,
    pub lease_deadline_ms: Option<u64>,
}

impl<T> Locked<T> {
    pub fn new(value: T) -> Self {
        Self { value, lock_owner: None, lease_deadline_ms: None }
    }

    pub fn is_claimable(&self, now_ms: u64) -> bool {
        match (&self.lock_owner, self.lease_deadline_ms) {
            (None, _) => true,
            (Some(_), Some(deadline)) => now_ms >= deadline,
            (Some(_), None) => false,
        }
    }

    pub fn claim(&mut self, owner: &str, lease_deadline_ms: u64) {
        self.lock_owner = Some(owner.to_string());
        self.lease_deadline_ms = Some(lease_deadline_ms);
    }

    pub fn release(&mut self) {
        self.lock_owner = None;
        self.lease_deadline_ms = None;
    }
}

pub type JobRow = Locked<JobSpec>;
pub type WorkRow = Locked<WorkSpec>;

/// Audit trail of commands applied from the command manager stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAuditRow {
    pub command_id: String,
    pub issued_at: u64,
    pub applied: bool,
    pub diag: String,
}

/// Cached documents fetched by the cacher stage for preparator/submitter plug-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRow {
    pub key: String,
    pub payload: serde_json::Value,
    pub fetched_at: u64,
}
