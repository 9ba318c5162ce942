// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pidfile acquisition for daemon mode. Grounded on the CLI crate's
//! `daemon_process` module (`read_daemon_pid`, `process_exists`,
//! `cleanup_stale_pid`) in this workspace, generalized from a fixed
//! state-directory file to a caller-supplied path.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidError {
    #[error("pidfile {path} is held by running process {pid}")]
    Contention { path: PathBuf, pid: u32 },
    #[error("failed to read pidfile {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write pidfile {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

/// A held pidfile. Removes the file on drop so a crash-free shutdown never
/// leaves a stale entry behind.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Acquire `path`: if it names a still-running process, fail with
    /// `Contention`; otherwise (missing, unreadable, or stale) overwrite it
    /// with this process's pid.
    pub fn acquire(path: &Path) -> Result<Self, PidError> {
        if let Some(pid) = read_pid(path)? {
            if process_exists(pid) {
                return Err(PidError::Contention { path: path.to_path_buf(), pid });
            }
            tracing::warn!(pid, path = %path.display(), "removing stale pidfile");
        }
        std::fs::write(path, std::process::id().to_string())
            .map_err(|source| PidError::Write { path: path.to_path_buf(), source })?;
        Ok(Self { path: path.to_path_buf() })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>, PidError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        std::fs::read_to_string(path).map_err(|source| PidError::Read { path: path.to_path_buf(), source })?;
    Ok(contents.trim().parse::<u32>().ok())
}

/// Check liveness via `kill -0`, matching the teacher workspace's
/// process-existence probe rather than reading `/proc` directly.
fn process_exists(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
