// src/context/mod.rs

//! Context store and input propagation.
//!
//! - [`store`] owns the shared context, the per-unit derived contexts, the
//!   per-context version counters and the append-only update history.
//! - [`binding`] describes, per unit, which shared fields and which
//!   prerequisite outputs make up its input, and builds that input.

pub mod binding;
pub mod store;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::UnitId;

pub use binding::{ContextBindings, InputBinding, build_unit_input};
pub use store::{ContextSnapshot, ContextStore, ContextUpdate, SHARED_CONTEXT};

/// Input snapshot handed to a unit callback.
///
/// This is a copy; units never mutate the store directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInput {
    pub unit_id: UnitId,
    /// Selected shared fields plus prerequisite outputs under their keys.
    pub data: Map<String, Value>,
    /// Raw recorded output of every prerequisite, keyed by unit id.
    pub upstream: BTreeMap<UnitId, Value>,
}

impl UnitInput {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn upstream_output(&self, unit: &str) -> Option<&Value> {
        self.upstream.get(unit)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `data` map as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}
