// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage-agent bodies and the generic worker loop that drives them.
//!
//! Every stage claims rows from the shared store, does one unit of work, and
//! releases or updates what it claimed — the claim/lease discipline in
//! `harv-storage` is the only synchronization between stages.

pub mod base;
pub mod plugin;
pub mod stages;

pub use base::{Stage, StageError, StageWorker};
pub use plugin::{
    resolve_for_queue, MonitorPlugin, NoopMonitor, NoopPreparator, NoopStager, NoopSubmitter, NoopSweeper, PluginError, PluginRegistry,
    PreparatorPlugin, StagerPlugin, SubmitterPlugin, SweeperPlugin, VerbResult,
};
pub use stages::{
    Cacher, CommandManager, CredentialManager, CredentialRefresher, EventFeeder, JobFetcher, Monitor, NoopRefresher, Preparator,
    Propagator, Stager, Submitter, Sweeper,
};
