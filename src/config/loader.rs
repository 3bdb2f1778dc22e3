// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::model::{PipelineConfig, RawPipelineConfig};
use crate::errors::{AgentdagError, Result};

/// Load a pipeline file and return the raw, unvalidated model.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawPipelineConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a pipeline file and validate it:
///
/// - at least one unit, each with exactly one kind
/// - known, non-self `after` references
/// - `required` fields covered by `shared`
/// - assembly order naming declared sections
/// - no dependency cycles
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let raw = load_from_path(&path)?;
    PipelineConfig::try_from(raw)
}

/// Read the seed shared context: a JSON object.
pub fn load_input(path: impl AsRef<Path>) -> Result<Map<String, Value>> {
    let contents = fs::read_to_string(path.as_ref())?;
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(map),
        other => Err(AgentdagError::ConfigError(format!(
            "input must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Default pipeline file in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Agentdag.toml")
}
