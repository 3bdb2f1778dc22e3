// src/config/mod.rs

//! Pipeline configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate unit references, unit kinds and acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_input};
pub use model::{AssemblySection, ConfigSection, PipelineConfig, RawPipelineConfig, UnitConfig};
