// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical unit identifier used throughout the crate.
pub type UnitId = String;

/// Lifecycle state of a registered unit.
///
/// `running` is implicit: a launched unit stays `Pending` until its callback
/// returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Completed | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Pending => "pending",
            UnitState::Completed => "completed",
            UnitState::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for UnitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(UnitState::Pending),
            "completed" => Ok(UnitState::Completed),
            "failed" => Ok(UnitState::Failed),
            other => Err(format!(
                "invalid unit state: {other} (expected \"pending\", \"completed\" or \"failed\")"
            )),
        }
    }
}

/// How a unit's callback finished, as reported back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Success(serde_json::Value),
    Failed(String),
}
