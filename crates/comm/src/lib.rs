// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! harv-comm: the pool of clients to the central dispatch service.

pub mod client;
pub mod pool;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{CommandDirective, Communicator, EventRecord, HttpCommunicator, JobPayload, JobStatusDiff, TransientRemoteError};
pub use pool::{CommunicatorLease, CommunicatorPool};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCommunicator;
