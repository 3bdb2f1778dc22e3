// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Unit registered twice: {0}")]
    DuplicateUnit(String),

    #[error("Cycle detected in unit dependencies: {0}")]
    DependencyCycle(String),

    #[error("Unit '{unit}' is missing required input '{field}'")]
    MissingInput { unit: String, field: String },

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("Run incomplete: failed={failed:?} unreached={unreached:?}")]
    RunIncomplete {
        failed: Vec<String>,
        unreached: Vec<String>,
    },

    #[error("Quality gate rejected sections: {0:?}")]
    QualityRejected(Vec<String>),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AgentdagError>;
