// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage-agent base: the common lifecycle every stage body shares.
//!
//! Grounded on `master.py`'s per-thread loop (`execute()`, sleep with early
//! wake, repeat until stop) and its `execute()`-before-`start()` handling for
//! the credential manager and cacher stages, expressed here as a generic
//! worker over a [`Stage`] trait rather than Python duck typing.

use harv_core::StopEvent;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("remote call failed: {0}")]
    Remote(#[from] harv_comm::TransientRemoteError),
    #[error("db error: {0}")]
    Store(#[from] harv_storage::StoreError),
    #[error("plug-in error: {0}")]
    Plugin(String),
}

/// One phase of the worker lifecycle. Implementors hold their own resource
/// handles (pool leases, the queue mapper, plug-in registries) and perform
/// one iteration of work per `execute()` call.
pub trait Stage: Send {
    const NAME: &'static str;

    /// One iteration of this stage's work. Errors are logged by the worker
    /// loop and never propagated past it — a stage bug must not stop the
    /// process or starve sibling workers.
    fn execute(&mut self) -> Result<(), StageError>;
}

/// Runs one `Stage` instance on its own thread: single-shot or looping with
/// a stop-aware sleep, tagged with the stage name and worker index.
pub struct StageWorker<S: Stage> {
    stage: S,
    worker_index: usize,
    stop: StopEvent,
    single_shot: bool,
    cycle_period: Duration,
}

impl<S: Stage> StageWorker<S> {
    pub fn new(stage: S, worker_index: usize, stop: StopEvent, single_shot: bool, cycle_period: Duration) -> Self {
        Self { stage, worker_index, stop, single_shot, cycle_period }
    }

    /// Execute the stage once before the periodic loop starts. Used by the
    /// supervisor for the "execute-first" stages (credential manager,
    /// cacher) so dependent stages find usable state on their first cycle.
    pub fn execute_once(&mut self) {
        self.run_one_iteration();
    }

    /// Run to completion: a single iteration in single-shot mode, otherwise
    /// loop until the shared stop signal is observed.
    pub fn run(&mut self) {
        loop {
            self.run_one_iteration();
            if self.single_shot {
                return;
            }
            if self.stop.wait(self.cycle_period) {
                return;
            }
        }
    }

    fn run_one_iteration(&mut self) {
        let span = tracing::info_span!("stage", name = S::NAME, worker = self.worker_index);
        let _guard = span.enter();
        if let Err(err) = self.stage.execute() {
            tracing::error!(error = %err, "stage execute failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStage {
        calls: Arc<AtomicUsize>,
        fail_every: usize,
    }

    impl Stage for CountingStage {
        const NAME: &'static str = "counting";

        fn execute(&mut self) -> Result<(), StageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every != 0 && n % self.fail_every == 0 {
                return Err(StageError::Plugin("synthetic failure".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn single_shot_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CountingStage { calls: Arc::clone(&calls), fail_every: 0 };
        let mut worker = StageWorker::new(stage, 0, StopEvent::new(), true, Duration::from_millis(1));
        worker.run();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn looping_worker_stops_promptly_after_stop_is_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CountingStage { calls: Arc::clone(&calls), fail_every: 0 };
        let stop = StopEvent::new();
        let mut worker = StageWorker::new(stage, 0, stop.clone(), false, Duration::from_millis(5));
        let handle = std::thread::spawn(move || worker.run());
        std::thread::sleep(Duration::from_millis(20));
        stop.set();
        handle.join().unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn an_execute_error_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = CountingStage { calls: Arc::clone(&calls), fail_every: 2 };
        let stop = StopEvent::new();
        let mut worker = StageWorker::new(stage, 0, stop.clone(), false, Duration::from_millis(5));
        let handle = std::thread::spawn(move || worker.run());
        std::thread::sleep(Duration::from_millis(40));
        stop.set();
        handle.join().unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 3, "errors must not stop the iteration loop");
    }
}
