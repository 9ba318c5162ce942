// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-queue policy: mapping type, late-binding, and a freeform plug-in
//! property bag overlaid verbatim from the queue-config JSON document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How JobSpecs bind to WorkSpecs for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    OneWorkerPerJob,
    ManyWorkersPerJob,
    ManyJobsPerWorker,
    OneToOne,
}

impl Default for MapType {
    fn default() -> Self {
        Self::OneToOne
    }
}

/// A plug-in selector resolved from a QueueConfig field: a module name, a
/// class name, and a property bag passed to its constructor.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub module: String,
    pub class: String,
    pub properties: Map<String, Value>,
}

/// Immutable, per-queue policy. Built once at startup from the queue-config
/// JSON document; every unrecognized key in that document's property bag is
/// preserved verbatim so plug-ins can read their own settings out of it.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_name: String,
    pub map_type: MapType,
    pub use_job_late_binding: bool,
    fields: Map<String, Value>,
}

impl QueueConfig {
    pub(crate) fn from_json(queue_name: String, mut fields: Map<String, Value>) -> Self {
        let map_type = fields
            .remove("mapType")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let use_job_late_binding = fields
            .remove("useJobLateBinding")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self { queue_name, map_type, use_job_late_binding, fields }
    }

    /// Look up an arbitrary property-bag key verbatim.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Resolve a plug-in selector named `verb` (e.g. `"submitter"`) from the
    /// property bag. Expects `{"<verb>": {"module": ..., "class": ..., ...}}`;
    /// every other key in that object becomes the plug-in's property bag.
    pub fn plugin(&self, verb: &str) -> Option<PluginSpec> {
        let obj = self.fields.get(verb)?.as_object()?.clone();
        let mut obj = obj;
        let module = obj.remove("module")?.as_str()?.to_string();
        let class = obj.remove("class")?.as_str()?.to_string();
        Some(PluginSpec { module, class, properties: obj })
    }

    /// All property-bag keys, for round-trip verification.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}
