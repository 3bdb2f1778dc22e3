// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`controller`] is the async shell around the pure
//!   [`crate::dag::Scheduler`]: it owns unit callbacks, builds inputs from
//!   the context store, spawns units and feeds completions back.
//! - [`orchestrator`] is the run-level entry point: seeds the shared
//!   context, runs the controller to quiescence, assembles the artifact and
//!   rolls back on any fatal outcome.

pub mod controller;
pub mod orchestrator;

pub use controller::{RunSummary, StatusHandle, TriggerController};
pub use orchestrator::{Orchestrator, RecoveryPoint, RunReport};
