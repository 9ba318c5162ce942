// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Process-wide, read-only configuration registry.
//!
//! Loaded once at startup from a TOML document with named sections
//! (`master`, `qconf`, and one table per stage), frozen afterwards. Every
//! stage reads its own `<stage>.n_threads` / `<stage>.sleepTime` through
//! [`ConfigRegistry::stage_settings`]; unrecognized stage names simply fall
//! back to defaults rather than erroring, since the set of stages is fixed
//! by the supervisor, not by this file.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no candidate path exists for the config file")]
    NotFound,
    #[error("config file at {path} is not valid TOML: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMaster {
    uname: Option<String>,
    gname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawQconf {
    #[serde(rename = "configFile")]
    config_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawStage {
    n_threads: Option<usize>,
    #[serde(rename = "sleepTime")]
    sleep_time_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    master: RawMaster,
    #[serde(default)]
    qconf: RawQconf,
    #[serde(flatten)]
    stages: HashMap<String, RawStage>,
}

/// Process identity the supervisor should run as (Unix uid/gid names).
#[derive(Debug, Clone, Default)]
pub struct MasterSettings {
    pub uname: Option<String>,
    pub gname: Option<String>,
}

/// Where the queue-config mapper should look for its JSON document.
#[derive(Debug, Clone)]
pub struct QconfSettings {
    pub config_file: String,
}

impl Default for QconfSettings {
    fn default() -> Self {
        Self { config_file: "queue_config.json".to_string() }
    }
}

/// Per-stage concurrency and cycle-period settings.
#[derive(Debug, Clone, Copy)]
pub struct StageSettings {
    pub n_threads: usize,
    pub sleep_time: Duration,
}

impl StageSettings {
    fn defaulted(default_sleep_secs: u64) -> Self {
        Self { n_threads: 1, sleep_time: Duration::from_secs(default_sleep_secs) }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    master: MasterSettings,
    qconf: QconfSettings,
    stages: HashMap<String, StageSettings>,
}

impl ConfigRegistry {
    /// Resolve and parse the config file: an explicit `path`, else
    /// `$HARVESTER_HOME/etc/harvester/harvester.toml`, else
    /// `/etc/harvester/harvester.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = Self::resolve_path(path).ok_or(ConfigError::NotFound)?;
        let text = std::fs::read_to_string(&resolved)
            .map_err(|source| ConfigError::Io { path: resolved.clone(), source })?;
        let raw: RawConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Malformed { path: resolved, source })?;
        Ok(Self::from_raw(raw))
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Ok(home) = std::env::var("HARVESTER_HOME") {
            let candidate = PathBuf::from(home).join("etc/harvester/harvester.toml");
            if candidate.exists() {
                return Some(candidate);
            }
        }
        let fallback = PathBuf::from("/etc/harvester/harvester.toml");
        if fallback.exists() {
            return Some(fallback);
        }
        None
    }

    fn from_raw(raw: RawConfig) -> Self {
        let stages = raw
            .stages
            .into_iter()
            .map(|(name, stage)| {
                let defaults = StageSettings::defaulted(30);
                let settings = StageSettings {
                    n_threads: stage.n_threads.unwrap_or(defaults.n_threads),
                    sleep_time: stage
                        .sleep_time_secs
                        .map(Duration::from_secs)
                        .unwrap_or(defaults.sleep_time),
                };
                (name, settings)
            })
            .collect();
        Self {
            master: MasterSettings { uname: raw.master.uname, gname: raw.master.gname },
            qconf: QconfSettings {
                config_file: raw.qconf.config_file.unwrap_or_else(|| QconfSettings::default().config_file),
            },
            stages,
        }
    }

    pub fn master(&self) -> &MasterSettings {
        &self.master
    }

    pub fn qconf(&self) -> &QconfSettings {
        &self.qconf
    }

    /// Settings for a named stage, defaulted (1 thread, `default_sleep_secs`
    /// cycle period) when the config file has no table for it.
    pub fn stage_settings(&self, stage_name: &str, default_sleep_secs: u64) -> StageSettings {
        self.stages
            .get(stage_name)
            .copied()
            .unwrap_or_else(|| StageSettings::defaulted(default_sleep_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_named_sections_and_stage_tables() {
        let f = write_toml(
            r#"
            [master]
            uname = "harvester"
            gname = "harvester"

            [qconf]
            configFile = "/etc/panda/queue_config.json"

            [jobfetcher]
            n_threads = 3
            sleepTime = 60
            "#,
        );
        let cfg = ConfigRegistry::load(Some(f.path())).unwrap();
        assert_eq!(cfg.master().uname.as_deref(), Some("harvester"));
        assert_eq!(cfg.qconf().config_file, "/etc/panda/queue_config.json");
        let settings = cfg.stage_settings("jobfetcher", 30);
        assert_eq!(settings.n_threads, 3);
        assert_eq!(settings.sleep_time, Duration::from_secs(60));
    }

    #[test]
    fn missing_stage_table_falls_back_to_defaults() {
        let f = write_toml("[master]\nuname = \"x\"\n");
        let cfg = ConfigRegistry::load(Some(f.path())).unwrap();
        let settings = cfg.stage_settings("sweeper", 45);
        assert_eq!(settings.n_threads, 1);
        assert_eq!(settings.sleep_time, Duration::from_secs(45));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ConfigRegistry::load(Some(Path::new("/nonexistent/path.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let f = write_toml("this is not [ valid toml");
        let err = ConfigRegistry::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn no_candidate_path_without_explicit_or_env() {
        std::env::remove_var("HARVESTER_HOME");
        // Only reachable if /etc/harvester/harvester.toml doesn't exist on the
        // test host, which is the expected case in CI sandboxes.
        if !Path::new("/etc/harvester/harvester.toml").exists() {
            let err = ConfigRegistry::load(None).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound));
        }
    }
}
