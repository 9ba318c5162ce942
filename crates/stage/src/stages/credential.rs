// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential manager: refreshes X.509/token material on disk before any
//! other stage starts, then renews it periodically. No DB handoff.

use crate::base::{Stage, StageError};
use crate::plugin::VerbResult;
use std::sync::Arc;

/// The refresh call itself is back-end specific and out of scope (see
/// SPEC_FULL §1); this stage owns only the lifecycle around it.
pub trait CredentialRefresher: Send + Sync {
    fn refresh(&self) -> VerbResult;
}

pub struct NoopRefresher;

impl CredentialRefresher for NoopRefresher {
    fn refresh(&self) -> VerbResult {
        VerbResult::ok()
    }
}

pub struct CredentialManager {
    refresher: Arc<dyn CredentialRefresher>,
}

impl CredentialManager {
    pub fn new(refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self { refresher }
    }
}

impl Stage for CredentialManager {
    const NAME: &'static str = "credential_manager";

    fn execute(&mut self) -> Result<(), StageError> {
        let result = self.refresher.refresh();
        if !result.ok {
            tracing::warn!(diag = %result.diag, "credential refresh failed, stale material remains in place");
        }
        Ok(())
    }
}
