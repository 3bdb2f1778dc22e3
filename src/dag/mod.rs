// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`graph`] holds the static prerequisite relation between units.
//! - [`status`] holds the per-unit lifecycle records.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   units are eligible, and which dependents become eligible on completion.

pub mod graph;
pub mod scheduler;
pub mod status;

pub use graph::DependencyGraph;
pub use scheduler::{Scheduler, SchedulerStep};
pub use status::{StatusRegistry, UnitStatus, UnitStatusView};
