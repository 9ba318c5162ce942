// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size pool of [`Communicator`] clients, leased per RPC call.

use crate::client::Communicator;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

struct Inner {
    idle: Mutex<VecDeque<Arc<dyn Communicator>>>,
    available: Condvar,
}

/// A pool of interchangeable dispatcher clients. Construction takes a
/// factory closure so the pool owns how many distinct client objects exist
/// (the fixed size required by SPEC_FULL §4.2 step 1) while callers never
/// see the factory again.
pub struct CommunicatorPool {
    inner: Arc<Inner>,
}

impl CommunicatorPool {
    pub fn new(clients: Vec<Arc<dyn Communicator>>) -> Self {
        assert!(!clients.is_empty(), "communicator pool must have at least one client");
        Self { inner: Arc::new(Inner { idle: Mutex::new(clients.into()), available: Condvar::new() }) }
    }

    /// Lease a client, blocking until one is free. Returned to the pool
    /// when the guard drops.
    pub fn lease(&self) -> CommunicatorLease {
        let mut idle = self.inner.idle.lock();
        loop {
            if let Some(client) = idle.pop_front() {
                return CommunicatorLease { client: Some(client), pool: Arc::clone(&self.inner) };
            }
            self.inner.available.wait(&mut idle);
        }
    }
}

/// RAII lease: the underlying client state is stateless across calls (no
/// cleanup needed), so returning it is just pushing it back onto the idle
/// queue.
pub struct CommunicatorLease {
    client: Option<Arc<dyn Communicator>>,
    pool: Arc<Inner>,
}

impl std::ops::Deref for CommunicatorLease {
    type Target = Arc<dyn Communicator>;

    // Only `Drop` ever takes `client`, and it runs once, after the lease is
    // no longer reachable.
    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("lease dropped its client early")
    }
}

impl Drop for CommunicatorLease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.idle.lock().push_back(client);
            self.pool.available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CommandDirective, EventRecord, JobPayload, JobStatusDiff, TransientRemoteError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFake {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Communicator for CountingFake {
        async fn fetch_jobs(&self, _queue_name: &str, _max_jobs: u32) -> Result<Vec<JobPayload>, TransientRemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
        async fn report_job_status(&self, _diffs: &[JobStatusDiff]) -> Result<Vec<u64>, TransientRemoteError> {
            Ok(vec![])
        }
        async fn poll_commands(&self) -> Result<Vec<CommandDirective>, TransientRemoteError> {
            Ok(vec![])
        }
        async fn fetch_cache_document(&self, _key: &str) -> Result<serde_json::Value, TransientRemoteError> {
            Ok(serde_json::Value::Null)
        }
        async fn push_events(&self, _events: &[EventRecord]) -> Result<(), TransientRemoteError> {
            Ok(())
        }
    }

    #[test]
    fn lease_returns_client_to_pool_on_drop() {
        let pool = CommunicatorPool::new(vec![Arc::new(CountingFake { calls: AtomicUsize::new(0) })]);
        {
            let _lease = pool.lease();
        }
        // second lease would have blocked forever if the first wasn't returned
        let _lease2 = pool.lease();
    }

    #[tokio::test]
    async fn leased_client_is_usable() {
        let pool = CommunicatorPool::new(vec![Arc::new(CountingFake { calls: AtomicUsize::new(0) })]);
        let lease = pool.lease();
        let jobs = lease.fetch_jobs("Q1", 1).await.unwrap();
        assert!(jobs.is_empty());
    }
}
