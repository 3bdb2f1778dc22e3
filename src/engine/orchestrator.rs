// src/engine/orchestrator.rs

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::assembly::{Artifact, Assembler, NonEmptyGate, QualityGate, SectionAssembler};
use crate::config::PipelineConfig;
use crate::context::{ContextSnapshot, ContextStore, InputBinding};
use crate::dag::UnitStatusView;
use crate::engine::controller::{RunSummary, StatusHandle, TriggerController};
use crate::errors::{AgentdagError, Result};
use crate::exec::UnitCallback;
use crate::types::UnitId;

/// Context state captured before a run, restored on a fatal outcome.
#[derive(Debug, Clone)]
pub struct RecoveryPoint {
    pub taken_at: DateTime<Utc>,
    snapshot: ContextSnapshot,
}

impl RecoveryPoint {
    pub fn capture(store: &ContextStore) -> Self {
        Self {
            taken_at: Utc::now(),
            snapshot: store.snapshot(),
        }
    }

    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub artifact: Artifact,
    pub summary: RunSummary,
    pub statuses: Vec<UnitStatusView>,
}

/// Run-level entry point.
///
/// Composes the context store, the trigger controller, the assembler and
/// the quality gate. A run is fatal if the graph has a cycle, any unit
/// failed or was never reached, or the quality gate rejects a section; a
/// fatal run restores the context captured before execution and resets
/// every unit to `pending`.
///
/// Runs on one orchestrator never overlap: a second `run` while one is
/// active fails with [`AgentdagError::RunInProgress`].
pub struct Orchestrator {
    context: Arc<Mutex<ContextStore>>,
    controller: TriggerController,
    assembler: Box<dyn Assembler>,
    gate: Box<dyn QualityGate>,
    run_guard: tokio::sync::Mutex<()>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        let context = Arc::new(Mutex::new(ContextStore::new()));
        Self {
            controller: TriggerController::new(Arc::clone(&context)),
            context,
            assembler: Box::new(SectionAssembler::new()),
            gate: Box::new(NonEmptyGate),
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Build an orchestrator with every unit of a validated pipeline
    /// registered in dependency order.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let mut orchestrator = Self::new();
        if let Some(max) = cfg.config.max_in_flight {
            orchestrator = orchestrator.with_max_in_flight(max);
        }

        let mut assembler = SectionAssembler::new().with_order(cfg.assembly.order.clone());

        for name in cfg.unit_order() {
            let unit = cfg
                .unit
                .get(name)
                .ok_or_else(|| AgentdagError::UnitNotFound(name.clone()))?;

            orchestrator.register(name.clone(), unit.after.clone(), unit.callback()?)?;
            orchestrator.bind(name.clone(), unit.binding());
            if let Some(section) = &unit.section {
                assembler = assembler.with_section(name.clone(), section.clone());
            }
        }

        Ok(orchestrator.with_assembler(assembler))
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.controller = self.controller.with_max_in_flight(max);
        self
    }

    pub fn with_assembler(mut self, assembler: impl Assembler + 'static) -> Self {
        self.assembler = Box::new(assembler);
        self
    }

    pub fn with_gate(mut self, gate: impl QualityGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn register<I, S>(
        &mut self,
        unit_id: impl Into<UnitId>,
        dependencies: I,
        callback: UnitCallback,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        self.controller.register(unit_id, dependencies, callback)
    }

    pub fn bind(&mut self, unit: impl Into<UnitId>, binding: InputBinding) {
        self.controller.bind(unit, binding);
    }

    pub fn controller(&self) -> &TriggerController {
        &self.controller
    }

    pub fn context(&self) -> Arc<Mutex<ContextStore>> {
        Arc::clone(&self.context)
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.controller.status_handle()
    }

    /// Seed the shared context, run every unit and assemble the artifact.
    ///
    /// Every call is a fresh run: statuses left by a previous run are reset
    /// first, so each unit executes again against the new seed.
    ///
    /// On any fatal outcome the context is restored to the state right after
    /// seeding, all statuses are reset, and the error is returned.
    pub async fn run(&self, seed: Map<String, Value>) -> Result<RunReport> {
        let _running = self
            .run_guard
            .try_lock()
            .map_err(|_| AgentdagError::RunInProgress)?;
        self.controller.reset_all()?;

        let recovery = {
            let mut store = self.context.lock();
            store.update_shared(seed);
            RecoveryPoint::capture(&store)
        };

        match self.execute().await {
            Ok(report) => Ok(report),
            // Someone else's run owns the context; leave it alone.
            Err(err @ AgentdagError::RunInProgress) => Err(err),
            Err(err) => {
                error!(error = %err, "run failed");
                if let Err(reset_err) = self.recover(recovery, &err) {
                    error!(error = %reset_err, "recovery could not reset unit statuses");
                }
                Err(err)
            }
        }
    }

    async fn execute(&self) -> Result<RunReport> {
        let summary = self.controller.run_all().await?;

        if !summary.is_complete() {
            return Err(AgentdagError::RunIncomplete {
                failed: summary.failed.iter().map(|(id, _)| id.clone()).collect(),
                unreached: summary.unreached.clone(),
            });
        }

        let outputs: Vec<(UnitId, Value)> = {
            let store = self.context.lock();
            summary
                .completed
                .iter()
                .filter_map(|id| store.output_of(id).map(|v| (id.clone(), v.clone())))
                .collect()
        };

        let artifact = self.assembler.assemble(&outputs)?;

        let rejected = self.gate.rejected(&artifact);
        if !rejected.is_empty() {
            return Err(AgentdagError::QualityRejected(rejected));
        }

        info!(run_id = summary.run_id, sections = artifact.sections.len(), "run succeeded");
        Ok(RunReport {
            artifact,
            summary,
            statuses: self.controller.statuses(),
        })
    }

    /// Restore the captured context and reset every unit to `pending`.
    pub fn recover(&self, point: RecoveryPoint, cause: &AgentdagError) -> Result<()> {
        warn!(
            error = %cause,
            taken_at = %point.taken_at,
            "attempting recovery from snapshot"
        );
        self.context.lock().restore(point.snapshot);
        self.controller.reset_all()
    }
}
