// src/context/store.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::context::UnitInput;
use crate::context::binding::{InputBinding, build_unit_input};
use crate::errors::Result;
use crate::types::UnitId;

/// Name of the shared context in version counters and history records.
pub const SHARED_CONTEXT: &str = "shared";

/// One entry of the append-only update history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUpdate {
    pub timestamp: DateTime<Utc>,
    pub context_name: String,
    pub delta: Value,
    /// Version of `context_name` after this update.
    pub version: u64,
}

/// Verbatim copy of the shared context, the per-unit derived inputs and the
/// recorded outputs, used for recovery.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextSnapshot {
    shared: Map<String, Value>,
    unit_contexts: HashMap<UnitId, Map<String, Value>>,
    outputs: HashMap<UnitId, Value>,
}

impl ContextSnapshot {
    pub fn shared(&self) -> &Map<String, Value> {
        &self.shared
    }
}

/// Versioned key-value store behind every unit's input and output.
///
/// Every mutation goes through an explicit method that returns the new
/// version of the context it touched.
#[derive(Debug, Default)]
pub struct ContextStore {
    shared: Map<String, Value>,
    /// Derived input last prepared for each unit.
    unit_contexts: HashMap<UnitId, Map<String, Value>>,
    /// Recorded outputs, kept apart from the derived inputs so an input key
    /// can never pass for an output.
    outputs: HashMap<UnitId, Value>,
    versions: HashMap<String, u64>,
    history: Vec<ContextUpdate>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shared context wholesale.
    pub fn initialize_shared(&mut self, data: Map<String, Value>) -> u64 {
        self.shared = data.clone();
        info!("shared context initialized");
        self.log_update(SHARED_CONTEXT, Value::Object(data))
    }

    /// Merge `delta` into the shared context (top-level keys overwrite).
    pub fn update_shared(&mut self, delta: Map<String, Value>) -> u64 {
        for (key, value) in &delta {
            self.shared.insert(key.clone(), value.clone());
        }
        info!(keys = delta.len(), "shared context updated");
        self.log_update(SHARED_CONTEXT, Value::Object(delta))
    }

    pub fn shared(&self) -> &Map<String, Value> {
        &self.shared
    }

    /// Rebuild `unit`'s derived input from the shared context and the
    /// recorded outputs of `prerequisites`, store it, and return a copy.
    pub fn prepare_unit_input(
        &mut self,
        unit: &str,
        binding: &InputBinding,
        prerequisites: &[UnitId],
    ) -> Result<UnitInput> {
        let mut upstream = BTreeMap::new();
        for dep in prerequisites {
            match self.output_of(dep) {
                Some(output) => {
                    upstream.insert(dep.clone(), output.clone());
                }
                None => warn!(unit = %unit, dep = %dep, "prerequisite has no recorded output"),
            }
        }

        let data = build_unit_input(unit, &self.shared, &upstream, binding)?;
        self.unit_contexts.insert(unit.to_string(), data.clone());
        debug!(unit = %unit, keys = data.len(), "unit context initialized");

        Ok(UnitInput {
            unit_id: unit.to_string(),
            data,
            upstream,
        })
    }

    /// Record `unit`'s output and bump its version.
    pub fn record_output(&mut self, unit: &str, output: Value) -> u64 {
        self.outputs.insert(unit.to_string(), output.clone());

        let mut delta = Map::new();
        delta.insert("output".to_string(), output);
        self.log_update(unit, Value::Object(delta))
    }

    pub fn output_of(&self, unit: &str) -> Option<&Value> {
        self.outputs.get(unit)
    }

    /// Derived input last prepared for `unit`.
    pub fn unit_context(&self, unit: &str) -> Option<&Map<String, Value>> {
        self.unit_contexts.get(unit)
    }

    /// Current version of a named context; 0 if never updated.
    pub fn version_of(&self, context_name: &str) -> u64 {
        self.versions.get(context_name).copied().unwrap_or(0)
    }

    pub fn history(&self) -> &[ContextUpdate] {
        &self.history
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            shared: self.shared.clone(),
            unit_contexts: self.unit_contexts.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Put the shared and per-unit contexts back exactly as captured.
    ///
    /// Version counters and history are not rolled back.
    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        self.shared = snapshot.shared;
        self.unit_contexts = snapshot.unit_contexts;
        self.outputs = snapshot.outputs;
        info!(
            shared_keys = self.shared.len(),
            unit_contexts = self.unit_contexts.len(),
            outputs = self.outputs.len(),
            "context restored from snapshot"
        );
    }

    fn log_update(&mut self, context_name: &str, delta: Value) -> u64 {
        let version = self.versions.entry(context_name.to_string()).or_insert(0);
        *version += 1;
        let version = *version;

        self.history.push(ContextUpdate {
            timestamp: Utc::now(),
            context_name: context_name.to_string(),
            delta,
            version,
        });
        debug!(context = %context_name, version, "context update logged");
        version
    }
}
