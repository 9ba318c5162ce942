// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobSpec`: a central-dispatch unit of work.

use crate::workspec::WorkerId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Locally-assigned id for a JobSpec row (distinct from its PandaID,
    /// which is assigned by the central dispatcher).
    pub struct JobId("job-");
}

/// Globally-unique id assigned by the central dispatch service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PandaId(pub u64);

impl std::fmt::Display for PandaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle order a JobSpec's status must move through without
/// skipping a state: `new -> fetched -> prepared -> submitted -> running
/// -> finished|failed -> swept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSpecStatus {
    New,
    Fetched,
    Prepared,
    Submitted,
    Running,
    Finished,
    Failed,
    Cancelled,
    /// Submitter's plug-in call failed; released for retry subject to an
    /// attempt cap before it is finally marked `Failed`.
    SubmitFailed,
    Swept,
}

crate::simple_display! {
    JobSpecStatus {
        New => "new",
        Fetched => "fetched",
        Prepared => "prepared",
        Submitted => "submitted",
        Running => "running",
        Finished => "finished",
        Failed => "failed",
        Cancelled => "cancelled",
        SubmitFailed => "submit_failed",
        Swept => "swept",
    }
}

impl JobSpecStatus {
    /// Ordinal position in the canonical lifecycle, used to assert that a
    /// transition never skips a state. `SubmitFailed` is a retry detour
    /// back to `Prepared`'s position, not a forward step.
    fn ordinal(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Fetched => 1,
            Self::Prepared | Self::SubmitFailed => 2,
            Self::Submitted => 3,
            Self::Running => 4,
            Self::Finished | Self::Failed | Self::Cancelled => 5,
            Self::Swept => 6,
        }
    }

    /// Whether `next` is a legal transition from `self`: strictly forward
    /// by at most one step, or a retry detour from `Submitted`/`SubmitFailed`
    /// back to `Prepared` (so the submitter can try again).
    pub fn can_transition_to(self, next: JobSpecStatus) -> bool {
        if matches!(next, JobSpecStatus::SubmitFailed) {
            return matches!(self, JobSpecStatus::Submitted);
        }
        if matches!(next, JobSpecStatus::Prepared) && matches!(self, JobSpecStatus::SubmitFailed) {
            return true;
        }
        next.ordinal() == self.ordinal() + 1
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }

    /// One legal hop toward `target`. Lets a caller walk a job through
    /// several lifecycle states before persisting the final one — e.g. the
    /// propagator syncing a JobSpec to a linked WorkSpec that has already
    /// advanced past the job's last known status.
    pub fn step_toward(self, target: JobSpecStatus) -> JobSpecStatus {
        if self == target {
            return self;
        }
        match self {
            Self::New => Self::Fetched,
            Self::Fetched => Self::Prepared,
            Self::Prepared => Self::Submitted,
            Self::Submitted => {
                if target == Self::SubmitFailed {
                    Self::SubmitFailed
                } else {
                    Self::Running
                }
            }
            Self::SubmitFailed => Self::Prepared,
            Self::Running => target,
            _ => target,
        }
    }
}

/// A central-dispatch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: JobId,
    pub panda_id: PandaId,
    pub attempt_nr: u32,
    pub queue_name: String,
    pub status: JobSpecStatus,
    pub payload: serde_json::Value,
    pub worker_id: Option<WorkerId>,
    pub submit_attempts: u32,
}

impl JobSpec {
    pub fn new(panda_id: PandaId, queue_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_id: JobId::new(),
            panda_id,
            attempt_nr: 1,
            queue_name: queue_name.into(),
            status: JobSpecStatus::New,
            payload,
            worker_id: None,
            submit_attempts: 0,
        }
    }

    /// Walk `status` forward to `target` one legal hop at a time, asserting
    /// each hop against [`JobSpecStatus::can_transition_to`]. Bounded so a
    /// target unreachable from the current status (e.g. resurrecting a
    /// `Swept` job) can't spin forever.
    pub fn advance_to(&mut self, target: JobSpecStatus) {
        for _ in 0..8 {
            if self.status == target {
                return;
            }
            let next = self.status.step_toward(target);
            debug_assert!(
                self.status.can_transition_to(next),
                "illegal hop {:?} -> {:?}",
                self.status,
                next
            );
            if next == self.status {
                return;
            }
            self.status = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_never_skips_a_state() {
        use JobSpecStatus::*;
        assert!(New.can_transition_to(Fetched));
        assert!(!New.can_transition_to(Prepared));
        assert!(!New.can_transition_to(Submitted));
        assert!(Fetched.can_transition_to(Prepared));
        assert!(Prepared.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Running));
        assert!(Running.can_transition_to(Finished));
        assert!(Finished.can_transition_to(Swept));
    }

    #[test]
    fn submit_failure_detours_back_to_prepared_for_retry() {
        use JobSpecStatus::*;
        assert!(Submitted.can_transition_to(SubmitFailed));
        assert!(SubmitFailed.can_transition_to(Prepared));
        assert!(!SubmitFailed.can_transition_to(Running));
    }

    #[test]
    fn advance_to_walks_every_intermediate_state() {
        let mut job = JobSpec::new(PandaId(1), "Q1", serde_json::json!({}));
        job.advance_to(JobSpecStatus::Running);
        assert_eq!(job.status, JobSpecStatus::Running);
        job.advance_to(JobSpecStatus::Finished);
        assert_eq!(job.status, JobSpecStatus::Finished);
    }

    #[test]
    fn terminal_statuses_are_finished_failed_cancelled() {
        assert!(JobSpecStatus::Finished.is_terminal());
        assert!(!JobSpecStatus::Swept.is_terminal());
    }
}
