// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! harv-storage: the shared DB-like store and its pooled, claim/lease
//! handoff — the system's only cross-stage synchronization mechanism.

pub mod pool;
pub mod rows;
pub mod snapshot;
pub mod store;

pub use pool::{DbProxy, DbProxyLease, DbProxyPool};
pub use rows::{CacheRow, CommandAuditRow, JobRow, WorkRow, Locked};
pub use snapshot::{restore_snapshot, write_snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{Store, StoreError};
