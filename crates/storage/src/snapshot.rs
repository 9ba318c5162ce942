// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk snapshot persistence for crash recovery, generalized from the
//! teacher's `MaterializedState` zstd-compressed snapshot pattern to carry
//! the lock-owner columns on every row.

use crate::rows::{CacheRow, CommandAuditRow, JobRow, WorkRow};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error on {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("snapshot at {path} is not valid zstd-compressed JSON: {source}")]
    Decode { path: String, #[source] source: serde_json::Error },
    #[error("zstd error: {0}")]
    Zstd(#[source] std::io::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SnapshotData {
    pub jobs: Vec<JobRow>,
    pub work: Vec<WorkRow>,
    pub commands: Vec<CommandAuditRow>,
    pub cache: Vec<CacheRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(rename = "v")]
    version: u32,
    taken_at_ms: u64,
    data: SnapshotData,
}

/// Write the full store contents to `path`, zstd-compressed JSON.
pub fn write_snapshot(store: &Store, path: &Path, now_ms: u64) -> Result<(), SnapshotError> {
    let snapshot = Snapshot { version: CURRENT_SNAPSHOT_VERSION, taken_at_ms: now_ms, data: store.snapshot_tables() };
    let json = serde_json::to_vec(&snapshot).map_err(|source| SnapshotError::Decode { path: path.display().to_string(), source })?;
    let compressed = zstd::encode_all(json.as_slice(), 0).map_err(SnapshotError::Zstd)?;
    fs::write(path, compressed).map_err(|source| SnapshotError::Io { path: path.display().to_string(), source })
}

/// Load a snapshot from `path` and restore it into `store`, replacing its
/// current contents wholesale.
pub fn restore_snapshot(store: &Store, path: &Path) -> Result<(), SnapshotError> {
    let compressed = fs::read(path).map_err(|source| SnapshotError::Io { path: path.display().to_string(), source })?;
    let json = zstd::decode_all(compressed.as_slice()).map_err(SnapshotError::Zstd)?;
    let snapshot: Snapshot =
        serde_json::from_slice(&json).map_err(|source| SnapshotError::Decode { path: path.display().to_string(), source })?;
    store.restore_tables(snapshot.data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harv_core::{JobSpec, PandaId};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn snapshot_round_trips_store_contents() {
        let store = Store::new();
        store.insert_job(JobSpec::new(PandaId(7), "ANALY_TEST", json!({"k": "v"})));

        let dir = tempdir().unwrap();
        let path = dir.path().join("state.zst");
        write_snapshot(&store, &path, 1_000).unwrap();

        let restored = Store::new();
        restore_snapshot(&restored, &path).unwrap();
        let jobs = restored.jobs_by_queue("ANALY_TEST");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].panda_id, PandaId(7));
    }

    #[test]
    fn restore_from_missing_file_errors() {
        let store = Store::new();
        let err = restore_snapshot(&store, Path::new("/nonexistent/path.zst"));
        assert!(err.is_err());
    }
}
