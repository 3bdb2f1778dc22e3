// src/engine/controller.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::{ContextBindings, ContextStore, InputBinding, UnitInput};
use crate::dag::{Scheduler, UnitStatus, UnitStatusView};
use crate::errors::{AgentdagError, Result};
use crate::exec::{UnitCallback, run_unit};
use crate::types::{UnitId, UnitOutcome, UnitState};

/// Result of one `run_all` call once quiescence is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub completed: Vec<UnitId>,
    /// `(unit, error message)` pairs.
    pub failed: Vec<(UnitId, String)>,
    /// Units still pending at quiescence.
    pub unreached: Vec<UnitId>,
}

impl RunSummary {
    /// Every unit completed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unreached.is_empty()
    }
}

/// Cheap, cloneable read-only view of unit statuses for external polling.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    scheduler: Arc<Mutex<Scheduler>>,
}

impl StatusHandle {
    pub fn snapshot(&self) -> Vec<UnitStatusView> {
        self.scheduler.lock().status_views()
    }

    pub fn state_of(&self, unit: &str) -> Option<UnitState> {
        self.scheduler.lock().statuses().state_of(unit)
    }

    pub fn is_running(&self) -> bool {
        !self.scheduler.lock().is_idle()
    }
}

/// Drives the [`Scheduler`] and executes unit callbacks.
///
/// Every completion is handled on the `run_all` task under the scheduler
/// lock, so checking a dependent's eligibility and marking it launched is
/// one critical section. Callbacks themselves run concurrently on their own
/// Tokio tasks, tracked in a [`JoinSet`] so `run_all` can wait for every
/// transitively spawned unit.
pub struct TriggerController {
    scheduler: Arc<Mutex<Scheduler>>,
    context: Arc<Mutex<ContextStore>>,
    callbacks: HashMap<UnitId, UnitCallback>,
    bindings: ContextBindings,
    limiter: Option<Arc<Semaphore>>,
}

impl fmt::Debug for TriggerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerController")
            .field("scheduler", &self.scheduler)
            .field("units", &self.callbacks.len())
            .field("limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl TriggerController {
    pub fn new(context: Arc<Mutex<ContextStore>>) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            context,
            callbacks: HashMap::new(),
            bindings: ContextBindings::new(),
            limiter: None,
        }
    }

    /// Cap the number of callbacks executing at once.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Register a unit with its prerequisites and callback.
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
        let unit_id = unit_id.into();
        let dependencies: Vec<UnitId> = dependencies.into_iter().map(Into::into).collect();

        self.scheduler.lock().register_unit(&unit_id, &dependencies)?;
        self.callbacks.insert(unit_id, callback);
        Ok(())
    }

    /// Set how `unit`'s input is built. Units without a binding receive the
    /// whole shared context plus their prerequisites' outputs.
    pub fn bind(&mut self, unit: impl Into<UnitId>, binding: InputBinding) {
        self.bindings.insert(unit, binding);
    }

    pub fn context(&self) -> Arc<Mutex<ContextStore>> {
        Arc::clone(&self.context)
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    pub fn statuses(&self) -> Vec<UnitStatusView> {
        self.scheduler.lock().status_views()
    }

    pub fn status_of(&self, unit: &str) -> Option<UnitStatus> {
        self.scheduler.lock().statuses().get(unit).cloned()
    }

    /// Unit ids in registration order.
    pub fn units(&self) -> Vec<UnitId> {
        self.scheduler.lock().graph().units().map(str::to_string).collect()
    }

    /// Put every unit back to `pending` with output and error cleared.
    ///
    /// Fails with [`AgentdagError::RunInProgress`] while `run_all` is active.
    pub fn reset_all(&self) -> Result<()> {
        self.scheduler.lock().reset_all()
    }

    /// Launch every eligible unit and keep launching dependents as units
    /// complete, until nothing is running and nothing new is eligible.
    ///
    /// Returns `Err` if the graph has a cycle or another `run_all` on this
    /// controller is still active; in both cases nothing runs. Unit failures
    /// are reported through the summary and statuses.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let start = self.scheduler.lock().start_run()?;
        let run_id = self.scheduler.lock().last_run_id();
        info!(run_id, roots = ?start.newly_launched, "run started");

        let mut in_flight: JoinSet<(UnitId, UnitOutcome)> = JoinSet::new();
        self.launch(start.newly_launched, &mut in_flight);

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((unit, outcome)) => {
                    let ready = self.complete(&unit, outcome);
                    self.launch(ready, &mut in_flight);
                }
                Err(e) => {
                    // run_unit contains callback panics, so this is unexpected.
                    error!(run_id, error = %e, "unit task terminated abnormally");
                }
            }
        }

        // Only reachable with units left in flight after an abnormal join.
        let stranded = self.scheduler.lock().abandon_run();
        if !stranded.is_empty() {
            error!(run_id, ?stranded, "units never reported back");
        }

        let summary = self.summary(run_id);
        info!(
            run_id,
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            unreached = summary.unreached.len(),
            "run reached quiescence"
        );
        Ok(summary)
    }

    /// Build inputs for `units` and spawn their callbacks. A unit whose input
    /// cannot be built is failed on the spot.
    fn launch(&self, units: Vec<UnitId>, in_flight: &mut JoinSet<(UnitId, UnitOutcome)>) {
        for unit in units {
            match self.prepare(&unit) {
                Ok((input, callback)) => {
                    debug!(unit = %unit, "spawning unit");
                    in_flight.spawn(run_unit(input, callback, self.limiter.clone()));
                }
                Err(e) => {
                    warn!(unit = %unit, error = %e, "unit input invalid; failing unit");
                    let ready = self.complete(&unit, UnitOutcome::Failed(e.to_string()));
                    debug_assert!(ready.is_empty());
                }
            }
        }
    }

    fn prepare(&self, unit: &str) -> Result<(UnitInput, UnitCallback)> {
        let callback = self
            .callbacks
            .get(unit)
            .cloned()
            .ok_or_else(|| AgentdagError::UnitNotFound(unit.to_string()))?;

        let prerequisites = self.scheduler.lock().graph().dependencies_of(unit).to_vec();
        let binding = self.bindings.get(unit);
        let input = self
            .context
            .lock()
            .prepare_unit_input(unit, &binding, &prerequisites)?;

        Ok((input, callback))
    }

    /// Record an outcome and return the dependents that became eligible.
    ///
    /// The output is written to the context store before the status flips,
    /// so no dependent can be launched ahead of its prerequisite's output.
    fn complete(&self, unit: &str, outcome: UnitOutcome) -> Vec<UnitId> {
        if let UnitOutcome::Success(output) = &outcome {
            self.context.lock().record_output(unit, output.clone());
        }
        self.scheduler.lock().handle_completion(unit, outcome).newly_launched
    }

    fn summary(&self, run_id: u64) -> RunSummary {
        let scheduler = self.scheduler.lock();
        let statuses = scheduler.statuses();

        let failed = statuses
            .iter()
            .filter(|(_, s)| s.state == UnitState::Failed)
            .map(|(id, s)| (id.to_string(), s.error.clone().unwrap_or_default()))
            .collect();

        RunSummary {
            run_id,
            completed: statuses.units_in(UnitState::Completed),
            failed,
            unreached: statuses.units_in(UnitState::Pending),
        }
    }
}
