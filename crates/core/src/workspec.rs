// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkSpec`: a local unit of execution bound to a back-end.

use crate::jobspec::JobId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a worker instance.
    pub struct WorkerId("wkr-");
}

/// Status of a `WorkSpec`. Created `Undefined`, transitioned by the
/// monitor stage, terminated by the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkSpecStatus {
    Undefined,
    Submitted,
    Running,
    Finished,
    Failed,
    Cancelled,
    Missed,
    /// Sweeper's kill_worker verb failed; retried until the attempt cap.
    KillFailed,
    /// Kill attempts exhausted the attempt cap; kept for audit, never swept.
    Unreachable,
}

crate::simple_display! {
    WorkSpecStatus {
        Undefined => "undefined",
        Submitted => "submitted",
        Running => "running",
        Finished => "finished",
        Failed => "failed",
        Cancelled => "cancelled",
        Missed => "missed",
        KillFailed => "kill_failed",
        Unreachable => "unreachable",
    }
}

impl WorkSpecStatus {
    /// Finished/Failed/Cancelled/Missed are terminal: the monitor stops
    /// polling the back-end and the sweeper becomes responsible for them.
    /// `KillFailed` is terminal-but-unswept (the sweeper keeps retrying it);
    /// `Unreachable` is terminal-and-permanent (kept for audit only).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished
                | Self::Failed
                | Self::Cancelled
                | Self::Missed
                | Self::KillFailed
                | Self::Unreachable
        )
    }

    /// Swept (rows deleted) only once genuinely done with, i.e. not stuck
    /// retrying a kill and not parked as permanently unreachable.
    pub fn is_sweepable(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled | Self::Missed)
    }
}

/// A worker record representing one unit of local execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSpec {
    pub worker_id: WorkerId,
    pub queue_name: String,
    pub access_point: String,
    pub status: WorkSpecStatus,
    pub submit_time_ms: u64,
    pub monitor_time_ms: u64,
    pub job_ids: Vec<JobId>,
    pub kill_attempts: u32,
}

impl WorkSpec {
    pub fn new(queue_name: impl Into<String>, access_point: impl Into<String>, now_ms: u64) -> Self {
        Self {
            worker_id: WorkerId::new(),
            queue_name: queue_name.into(),
            access_point: access_point.into(),
            status: WorkSpecStatus::Undefined,
            submit_time_ms: now_ms,
            monitor_time_ms: now_ms,
            job_ids: Vec::new(),
            kill_attempts: 0,
        }
    }
}
