// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RPC verbs stages use against the central dispatch service.
//!
//! The dispatcher's own protocol is out of scope for this crate (per
//! SPEC_FULL §1) — only the verbs a stage invokes are specified here, each
//! returning a [`TransientRemoteError`] on transport failure so the calling
//! stage can abandon the cycle and retry on the next one (§7).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransientRemoteError {
    #[error("dispatcher request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("dispatcher returned an unexpected response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub panda_id: u64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusDiff {
    pub panda_id: u64,
    pub status: String,
    pub core_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandDirective {
    pub command_id: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub worker_id: String,
    pub payload: serde_json::Value,
}

/// A client to the central dispatch service. Stateless across calls so
/// pool members are interchangeable.
#[async_trait]
pub trait Communicator: Send + Sync {
    async fn fetch_jobs(&self, queue_name: &str, max_jobs: u32) -> Result<Vec<JobPayload>, TransientRemoteError>;

    /// Reports status diffs; returns the PandaIDs the dispatcher confirmed.
    async fn report_job_status(&self, diffs: &[JobStatusDiff]) -> Result<Vec<u64>, TransientRemoteError>;

    async fn poll_commands(&self) -> Result<Vec<CommandDirective>, TransientRemoteError>;

    async fn fetch_cache_document(&self, key: &str) -> Result<serde_json::Value, TransientRemoteError>;

    async fn push_events(&self, events: &[EventRecord]) -> Result<(), TransientRemoteError>;
}

/// HTTP implementation, one JSON POST per verb against `base_url`.
pub struct HttpCommunicator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCommunicator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn endpoint(&self, verb: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), verb)
    }
}

#[async_trait]
impl Communicator for HttpCommunicator {
    async fn fetch_jobs(&self, queue_name: &str, max_jobs: u32) -> Result<Vec<JobPayload>, TransientRemoteError> {
        let resp = self
            .client
            .post(self.endpoint("getJobs"))
            .json(&serde_json::json!({"siteName": queue_name, "nJobs": max_jobs}))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<Vec<JobPayload>>().await?)
    }

    async fn report_job_status(&self, diffs: &[JobStatusDiff]) -> Result<Vec<u64>, TransientRemoteError> {
        let resp = self
            .client
            .post(self.endpoint("updateJobs"))
            .json(diffs)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<Vec<u64>>().await?)
    }

    async fn poll_commands(&self) -> Result<Vec<CommandDirective>, TransientRemoteError> {
        let resp = self.client.post(self.endpoint("getCommands")).send().await?.error_for_status()?;
        Ok(resp.json::<Vec<CommandDirective>>().await?)
    }

    async fn fetch_cache_document(&self, key: &str) -> Result<serde_json::Value, TransientRemoteError> {
        let resp = self
            .client
            .post(self.endpoint("getCacheData"))
            .json(&serde_json::json!({"key": key}))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<serde_json::Value>().await?)
    }

    async fn push_events(&self, events: &[EventRecord]) -> Result<(), TransientRemoteError> {
        self.client.post(self.endpoint("updateEvents")).json(events).send().await?.error_for_status()?;
        Ok(())
    }
}
