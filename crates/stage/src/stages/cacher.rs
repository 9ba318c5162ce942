// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cacher: fetches shared metadata documents used by other stages'
//! plug-ins and caches them. No claim discipline — cache rows are
//! overwritten wholesale, never contended for.

use crate::base::{Stage, StageError};
use harv_comm::CommunicatorPool;
use harv_core::Clock;
use harv_storage::{CacheRow, Store};
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct Cacher<C: Clock> {
    comm: Arc<CommunicatorPool>,
    store: Arc<Store>,
    clock: C,
    rt: Handle,
    keys: Vec<String>,
}

impl<C: Clock> Cacher<C> {
    pub fn new(comm: Arc<CommunicatorPool>, store: Arc<Store>, clock: C, rt: Handle, keys: Vec<String>) -> Self {
        Self { comm, store, clock, rt, keys }
    }
}

impl<C: Clock> Stage for Cacher<C> {
    const NAME: &'static str = "cacher";

    fn execute(&mut self) -> Result<(), StageError> {
        let lease = self.comm.lease();
        for key in &self.keys {
            let payload = self.rt.block_on(lease.fetch_cache_document(key))?;
            self.store.put_cache(CacheRow { key: key.clone(), payload, fetched_at: self.clock.epoch_ms() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harv_comm::FakeCommunicator;
    use harv_core::FakeClock;

    #[test]
    fn fetched_documents_land_in_the_cache() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fake = Arc::new(FakeCommunicator::new());
        fake.seed_cache("site_info", serde_json::json!({"ce": "CE1"}));
        let comm = Arc::new(CommunicatorPool::new(vec![fake]));
        let store = Arc::new(Store::new());

        let mut stage =
            Cacher::new(comm, Arc::clone(&store), FakeClock::new(), rt.handle().clone(), vec!["site_info".into()]);
        stage.execute().unwrap();

        let row = store.get_cache("site_info").unwrap();
        assert_eq!(row.payload, serde_json::json!({"ce": "CE1"}));
    }
}
