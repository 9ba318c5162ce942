// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide, level-triggered, set-once stop signal.
//!
//! Modeled as a broadcast condition variable rather than a cancellation
//! token: every stage worker shares one instance, observes it with a
//! timed wait at the end of each cycle, and nothing ever clears it.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct StopEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Idempotent; never clears.
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        let mut set = lock.lock();
        if !*set {
            *set = true;
            cvar.notify_all();
        }
    }

    pub fn is_set(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Block for up to `timeout`, waking early if the signal is set.
    /// Returns `true` if the signal was observed set.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut set = lock.lock();
        if *set {
            return true;
        }
        let result = cvar.wait_for(&mut set, timeout);
        *set || !result.timed_out()
    }
}
