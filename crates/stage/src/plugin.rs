// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-verb plug-in traits and the deferred-construction registry.
//!
//! Grounded on the "deferred imports" design note: constructing a stage must
//! not force construction of every back-end plug-in. Mirrors the adapter
//! trait + fake/noop pattern used for session and agent adapters in the
//! teacher workspace (`agent::coop::adapter::LocalAdapter` implementing a
//! common `AgentAdapter` trait, resolved per queue rather than globally).

use harv_core::{JobSpec, WorkSpec};
use harv_queue::{PluginSpec, QueueConfigMapper};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a single plug-in verb call. Every verb returns this shape and
/// must be safe to call repeatedly on the same input.
#[derive(Debug, Clone)]
pub struct VerbResult {
    pub ok: bool,
    pub diag: String,
}

impl VerbResult {
    pub fn ok() -> Self {
        Self { ok: true, diag: String::new() }
    }

    pub fn failed(diag: impl Into<String>) -> Self {
        Self { ok: false, diag: diag.into() }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("queue config names no {verb:?} plug-in")]
    NotConfigured { verb: &'static str },
    #[error("no plug-in registered under class {class:?}")]
    UnknownClass { class: String },
}

pub trait SubmitterPlugin: Send + Sync {
    fn submit_workers(&self, jobs: &[JobSpec]) -> Vec<(VerbResult, WorkSpec)>;
}

pub trait MonitorPlugin: Send + Sync {
    fn check_workers(&self, work: &[WorkSpec]) -> Vec<(VerbResult, harv_core::WorkSpecStatus)>;
}

pub trait PreparatorPlugin: Send + Sync {
    fn trigger_preparation(&self, job: &JobSpec) -> VerbResult;
}

pub trait StagerPlugin: Send + Sync {
    fn stage_out(&self, work: &WorkSpec) -> VerbResult;
}

pub trait SweeperPlugin: Send + Sync {
    fn kill_worker(&self, work: &WorkSpec) -> VerbResult;
    fn sweep_worker(&self, work: &WorkSpec) -> VerbResult;
}

/// Deferred-construction registry keyed by plug-in class name. Looking up a
/// stage's plug-in never constructs the plug-ins other stages use.
pub struct PluginRegistry<P: ?Sized> {
    constructors: HashMap<String, Box<dyn Fn(&PluginSpec) -> Arc<P> + Send + Sync>>,
}

impl<P: ?Sized> Default for PluginRegistry<P> {
    fn default() -> Self {
        Self { constructors: HashMap::new() }
    }
}

impl<P: ?Sized> PluginRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class: impl Into<String>, ctor: F)
    where
        F: Fn(&PluginSpec) -> Arc<P> + Send + Sync + 'static,
    {
        self.constructors.insert(class.into(), Box::new(ctor));
    }

    pub fn resolve(&self, spec: &PluginSpec) -> Result<Arc<P>, PluginError> {
        let ctor = self
            .constructors
            .get(&spec.class)
            .ok_or_else(|| PluginError::UnknownClass { class: spec.class.clone() })?;
        Ok(ctor(spec))
    }
}

/// Resolve `verb`'s plug-in for `queue_name` from the queue config, falling
/// back to `default` when the queue names none or names one this registry
/// doesn't recognize. Never constructs a plug-in for any queue but the one
/// asked about.
pub fn resolve_for_queue<P: ?Sized>(
    mapper: &QueueConfigMapper,
    queue_name: &str,
    verb: &str,
    registry: &PluginRegistry<P>,
    default: &Arc<P>,
) -> Arc<P> {
    mapper
        .get_queue(queue_name)
        .and_then(|q| q.plugin(verb))
        .and_then(|spec| registry.resolve(&spec).ok())
        .unwrap_or_else(|| Arc::clone(default))
}

/// A submitter that always succeeds and immediately marks the WorkSpec
/// submitted — the deliberate "no back-end plug-in configured" fallback
/// rather than a stand-in for a real scheduler integration.
pub struct NoopSubmitter;

impl SubmitterPlugin for NoopSubmitter {
    fn submit_workers(&self, jobs: &[JobSpec]) -> Vec<(VerbResult, WorkSpec)> {
        jobs.iter()
            .map(|job| {
                let mut work = WorkSpec::new(job.queue_name.clone(), "noop", 0);
                work.status = harv_core::WorkSpecStatus::Submitted;
                work.job_ids.push(job.job_id.clone());
                (VerbResult::ok(), work)
            })
            .collect()
    }
}

pub struct NoopMonitor;

impl MonitorPlugin for NoopMonitor {
    fn check_workers(&self, work: &[WorkSpec]) -> Vec<(VerbResult, harv_core::WorkSpecStatus)> {
        work.iter().map(|_| (VerbResult::ok(), harv_core::WorkSpecStatus::Finished)).collect()
    }
}

pub struct NoopPreparator;

impl PreparatorPlugin for NoopPreparator {
    fn trigger_preparation(&self, _job: &JobSpec) -> VerbResult {
        VerbResult::ok()
    }
}

pub struct NoopStager;

impl StagerPlugin for NoopStager {
    fn stage_out(&self, _work: &WorkSpec) -> VerbResult {
        VerbResult::ok()
    }
}

pub struct NoopSweeper;

impl SweeperPlugin for NoopSweeper {
    fn kill_worker(&self, _work: &WorkSpec) -> VerbResult {
        VerbResult::ok()
    }

    fn sweep_worker(&self, _work: &WorkSpec) -> VerbResult {
        VerbResult::ok()
    }
}
