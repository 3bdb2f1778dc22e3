// src/exec/mod.rs

//! Unit execution layer.
//!
//! - The callback contract every unit implements: take a [`UnitInput`]
//!   snapshot, return a [`UnitResult`] carrying at least an `output`.
//! - [`runner`] invokes one callback and turns whatever happens (error,
//!   panic, empty output) into a [`crate::types::UnitOutcome`].
//! - [`command`] and [`template`] are the built-in unit kinds used by
//!   pipelines loaded from a config file.

pub mod command;
pub mod runner;
pub mod template;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

pub use crate::context::UnitInput;
pub use command::command_unit;
pub use runner::run_unit;
pub use template::{Template, template_unit};

/// What a unit callback returns on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    pub output: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl UnitResult {
    pub fn new(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Boxed future returned by a unit callback.
pub type UnitFuture = Pin<Box<dyn Future<Output = anyhow::Result<UnitResult>> + Send>>;

/// A registered unit's entry point.
pub type UnitCallback = Arc<dyn Fn(UnitInput) -> UnitFuture + Send + Sync>;

/// Adapt an async closure into a [`UnitCallback`].
pub fn unit_fn<F, Fut>(f: F) -> UnitCallback
where
    F: Fn(UnitInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<UnitResult>> + Send + 'static,
{
    Arc::new(move |input| Box::pin(f(input)))
}

/// Outputs that count as "no result": null, "", [] and {}.
pub fn is_empty_output(output: &Value) -> bool {
    match output {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
