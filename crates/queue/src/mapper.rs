// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable mapping from queue name to [`QueueConfig`], loaded once at
//! startup. Grounded on `QueueConfigMapper.py`'s three-candidate path
//! resolution and "overlay every JSON key onto a struct with defaults"
//! behavior.

use crate::config::QueueConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueConfigError {
    #[error("no candidate path exists for the queue-config file {file_name:?}")]
    ConfigNotFound { file_name: String },
    #[error("queue-config file at {path} is not valid JSON: {source}")]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read queue-config file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Frozen, read-only-after-`load` mapping from queue name to policy.
#[derive(Debug, Clone, Default)]
pub struct QueueConfigMapper {
    queues: HashMap<String, QueueConfig>,
}

impl QueueConfigMapper {
    /// Resolve and parse the queue-config JSON document.
    ///
    /// `config_file` is either an absolute path, or a bare file name
    /// resolved against `<PANDA_HOME>/etc/panda/<name>` (if the
    /// `PANDA_HOME` env var is set and that file exists), falling back to
    /// `/etc/panda/<name>`.
    pub fn load(config_file: &str) -> Result<Self, QueueConfigError> {
        let path = Self::resolve_path(config_file)?;
        let text =
            std::fs::read_to_string(&path).map_err(|source| QueueConfigError::Io { path: path.clone(), source })?;
        let document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(|source| QueueConfigError::ConfigMalformed { path, source })?;

        let mut queues = HashMap::with_capacity(document.len());
        for (queue_name, value) in document {
            let fields = value.as_object().cloned().unwrap_or_default();
            queues.insert(queue_name.clone(), QueueConfig::from_json(queue_name, fields));
        }
        Ok(Self { queues })
    }

    fn resolve_path(config_file: &str) -> Result<PathBuf, QueueConfigError> {
        let as_path = Path::new(config_file);
        if as_path.is_absolute() {
            return Ok(as_path.to_path_buf());
        }
        if let Ok(panda_home) = std::env::var("PANDA_HOME") {
            let candidate = Path::new(&panda_home).join("etc/panda").join(config_file);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        let fallback = Path::new("/etc/panda").join(config_file);
        if fallback.exists() {
            return Ok(fallback);
        }
        Err(QueueConfigError::ConfigNotFound { file_name: config_file.to_string() })
    }

    pub fn has_queue(&self, queue_name: &str) -> bool {
        self.queues.contains_key(queue_name)
    }

    pub fn get_queue(&self, queue_name: &str) -> Option<&QueueConfig> {
        self.queues.get(queue_name)
    }

    pub fn queue_names(&self) -> impl Iterator<Item = &String> {
        self.queues.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_queue_json(contents: &serde_json::Value) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.to_string().as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_via_absolute_path_and_overlays_fields() {
        let doc = json!({
            "Q1": {"mapType": "one_worker_per_job", "siteName": "SITE1"},
            "Q2": {},
        });
        let f = write_queue_json(&doc);
        let mapper = QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap();
        assert!(mapper.has_queue("Q1"));
        assert!(mapper.has_queue("Q2"));
        assert!(!mapper.has_queue("Q3"));
        let q1 = mapper.get_queue("Q1").unwrap();
        assert_eq!(q1.get_str("siteName"), Some("SITE1"));
    }

    #[test]
    fn stable_across_repeated_lookups() {
        let doc = json!({"Q1": {"siteName": "SITE1"}});
        let f = write_queue_json(&doc);
        let mapper = QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap();
        let first = mapper.get_queue("Q1").unwrap().get_str("siteName");
        let second = mapper.get_queue("Q1").unwrap().get_str("siteName");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let err = QueueConfigMapper::load("definitely-does-not-exist.json").unwrap_err();
        assert!(matches!(err, QueueConfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn malformed_json_is_config_malformed() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ this is not json").unwrap();
        let err = QueueConfigMapper::load(f.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, QueueConfigError::ConfigMalformed { .. }));
    }

    #[test]
    fn resolves_via_panda_home_when_relative() {
        let dir = tempfile::tempdir().unwrap();
        let etc_panda = dir.path().join("etc/panda");
        std::fs::create_dir_all(&etc_panda).unwrap();
        std::fs::write(etc_panda.join("queues.json"), json!({"Q1": {}}).to_string()).unwrap();

        // SAFETY: test-only env mutation; serial_test-style isolation is
        // unnecessary here since each test uses a distinct relative file name.
        std::env::set_var("PANDA_HOME", dir.path());
        let mapper = QueueConfigMapper::load("queues.json").unwrap();
        std::env::remove_var("PANDA_HOME");
        assert!(mapper.has_queue("Q1"));
    }
}
