// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size pool of DB proxy handles. Same leasing shape as
//! `harv-comm::CommunicatorPool`, but logs starvation at a throttle since a
//! stuck DB pool is the more operationally interesting failure.

use crate::store::Store;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STARVATION_LOG_THROTTLE: Duration = Duration::from_secs(5);
const STARVATION_WAIT_CHUNK: Duration = Duration::from_millis(200);

struct Inner {
    idle: Mutex<VecDeque<DbProxy>>,
    available: Condvar,
    last_starvation_log_ms: AtomicU64,
}

/// A handle to the shared store, standing in for a pooled database
/// connection. All proxies share the same underlying `Store`; the pool's
/// job is to cap how many stage workers are "inside the DB" concurrently.
#[derive(Clone)]
pub struct DbProxy {
    store: Arc<Store>,
}

impl DbProxy {
    pub fn store(&self) -> &Store {
        &self.store
    }
}

pub struct DbProxyPool {
    inner: Arc<Inner>,
}

impl DbProxyPool {
    pub fn new(store: Arc<Store>, size: usize) -> Self {
        assert!(size > 0, "db proxy pool must have at least one slot");
        let idle = (0..size).map(|_| DbProxy { store: Arc::clone(&store) }).collect();
        Self {
            inner: Arc::new(Inner {
                idle: Mutex::new(idle),
                available: Condvar::new(),
                last_starvation_log_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Lease a proxy, blocking until the pool has a free slot. Logs
    /// starvation at a throttle so a wedged pool is visible without log
    /// spam from every blocked caller.
    pub fn lease(&self, now_ms: impl Fn() -> u64) -> DbProxyLease {
        let mut idle = self.inner.idle.lock();
        loop {
            if let Some(proxy) = idle.pop_front() {
                return DbProxyLease { proxy: Some(proxy), pool: Arc::clone(&self.inner) };
            }
            let timed_out = self.inner.available.wait_for(&mut idle, STARVATION_WAIT_CHUNK).timed_out();
            if timed_out {
                self.maybe_log_starvation(now_ms());
            }
        }
    }

    fn maybe_log_starvation(&self, now_ms: u64) {
        let last = self.inner.last_starvation_log_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) >= STARVATION_LOG_THROTTLE.as_millis() as u64 {
            self.inner.last_starvation_log_ms.store(now_ms, Ordering::Relaxed);
            tracing::warn!("db proxy pool starved: all connections leased, callers are blocking");
        }
    }
}

pub struct DbProxyLease {
    proxy: Option<DbProxy>,
    pool: Arc<Inner>,
}

impl std::ops::Deref for DbProxyLease {
    type Target = DbProxy;

    // Only `Drop` ever takes `proxy`, and it runs once, after the lease is
    // no longer reachable.
    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        self.proxy.as_ref().expect("lease dropped its proxy early")
    }
}

impl Drop for DbProxyLease {
    fn drop(&mut self) {
        if let Some(proxy) = self.proxy.take() {
            self.pool.idle.lock().push_back(proxy);
            self.pool.available.notify_one();
        }
    }
}
