// src/dag/status.rs

//! Per-unit lifecycle records.
//!
//! The scheduler is the only writer. Readers get owned snapshots
//! ([`UnitStatusView`]) so a poll never observes a half-written record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::types::{UnitId, UnitState};

/// Status of one registered unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStatus {
    pub state: UnitState,
    pub timestamp: DateTime<Utc>,
    /// Bumped on every mutation of this record, starting at 1.
    pub version: u64,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl UnitStatus {
    fn pending() -> Self {
        Self {
            state: UnitState::Pending,
            timestamp: Utc::now(),
            version: 1,
            output: None,
            error: None,
        }
    }

    fn touch(&mut self, state: UnitState) {
        self.state = state;
        self.timestamp = Utc::now();
        self.version += 1;
    }
}

/// Read-only view exposed to status pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatusView {
    pub unit_id: UnitId,
    pub state: UnitState,
    pub timestamp: DateTime<Utc>,
}

/// Status records keyed by unit id, iterated in registration order.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    order: Vec<UnitId>,
    entries: HashMap<UnitId, UnitStatus>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `pending` record. Returns `false` if one already exists.
    pub fn register(&mut self, unit: &str) -> bool {
        if self.entries.contains_key(unit) {
            return false;
        }
        self.entries.insert(unit.to_string(), UnitStatus::pending());
        self.order.push(unit.to_string());
        true
    }

    pub fn get(&self, unit: &str) -> Option<&UnitStatus> {
        self.entries.get(unit)
    }

    pub fn state_of(&self, unit: &str) -> Option<UnitState> {
        self.entries.get(unit).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn mark_completed(&mut self, unit: &str, output: Value) -> bool {
        match self.entries.get_mut(unit) {
            Some(status) => {
                status.touch(UnitState::Completed);
                status.output = Some(output);
                status.error = None;
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, unit: &str, error: impl Into<String>) -> bool {
        match self.entries.get_mut(unit) {
            Some(status) => {
                status.touch(UnitState::Failed);
                status.error = Some(error.into());
                true
            }
            None => false,
        }
    }

    /// Put every unit back to `pending` with output and error cleared.
    pub fn reset_all(&mut self) {
        for status in self.entries.values_mut() {
            status.touch(UnitState::Pending);
            status.output = None;
            status.error = None;
        }
    }

    /// `(unit, status)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UnitStatus)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|s| (id.as_str(), s)))
    }

    pub fn units_in(&self, state: UnitState) -> Vec<UnitId> {
        self.iter()
            .filter(|(_, s)| s.state == state)
            .map(|(id, _)| id.to_string())
            .collect()
    }

    pub fn views(&self) -> Vec<UnitStatusView> {
        self.iter()
            .map(|(id, s)| UnitStatusView {
                unit_id: id.to_string(),
                state: s.state,
                timestamp: s.timestamp,
            })
            .collect()
    }
}
