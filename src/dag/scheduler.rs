use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::status::{StatusRegistry, UnitStatusView};
use crate::errors::{AgentdagError, Result};
use crate::types::{UnitId, UnitOutcome, UnitState};

/// Structured result of a single scheduler "step".
///
/// Tests use this to step the graph by hand and make assertions about what
/// changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Units that became eligible and were marked launched by this step.
    pub newly_launched: Vec<UnitId>,
    /// Units that were marked failed by this step.
    pub newly_failed: Vec<UnitId>,
    /// Whether this step brought the current run to quiescence.
    pub run_just_finished: bool,
}

/// Scheduler holds the dependency graph plus the per-run state.
///
/// It is responsible for:
/// - registering units and their prerequisites
/// - refusing to start a run over a cyclic graph
/// - deciding when a unit is eligible (all prerequisites completed)
/// - launching each unit at most once per run
/// - recording completions and failures
///
/// It is synchronous and performs no IO; the async shell in
/// [`crate::engine::TriggerController`] drives it under a single lock, which
/// is the serialization point for every eligibility decision.
#[derive(Debug, Default)]
pub struct Scheduler {
    graph: DependencyGraph,
    statuses: StatusRegistry,
    /// Units launched during the current run.
    launched: HashSet<UnitId>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit with its prerequisites. Creates a `pending` status.
    pub fn register_unit(&mut self, unit: &str, dependencies: &[UnitId]) -> Result<()> {
        if !self.statuses.register(unit) {
            return Err(AgentdagError::DuplicateUnit(unit.to_string()));
        }

        self.graph.add_unit(unit);
        for dep in dependencies {
            self.graph.add_dependency(unit, dep);
        }

        info!(unit = %unit, ?dependencies, "registered unit");
        Ok(())
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn statuses(&self) -> &StatusRegistry {
        &self.statuses
    }

    pub fn status_views(&self) -> Vec<UnitStatusView> {
        self.statuses.views()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// ID of the most recently started run (0 before the first run).
    pub fn last_run_id(&self) -> u64 {
        self.run_counter
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Start a new run and launch every currently eligible unit.
    ///
    /// Fails with [`AgentdagError::RunInProgress`] while a run is active,
    /// and with [`AgentdagError::DependencyCycle`] before anything is
    /// launched if the graph contains a cycle.
    pub fn start_run(&mut self) -> Result<SchedulerStep> {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "start requested while a run is active; refusing");
            return Err(AgentdagError::RunInProgress);
        }

        if let Some(unit) = self.graph.find_cycle() {
            error!(unit = %unit, "circular dependency detected; refusing to run");
            return Err(AgentdagError::DependencyCycle(format!(
                "cycle detected in unit graph involving '{unit}'"
            )));
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.launched.clear();
        debug!(run_id = self.run_counter, "scheduler: starting new run");

        let candidates: Vec<UnitId> = self.graph.units().map(str::to_string).collect();
        let newly_launched = candidates
            .into_iter()
            .filter(|unit| self.try_launch(unit))
            .collect::<Vec<_>>();

        if newly_launched.is_empty() {
            info!(run_id = self.run_counter, "no units ready for execution");
        }

        let run_just_finished = self.maybe_finish_run();

        Ok(SchedulerStep {
            newly_launched,
            newly_failed: Vec::new(),
            run_just_finished,
        })
    }

    /// Record the outcome of a launched unit and launch any direct dependents
    /// whose prerequisites are now all completed.
    pub fn handle_completion(&mut self, unit: &str, outcome: UnitOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(run_id) = self.current_run_id else {
            warn!(unit = %unit, "completion with no active run; ignoring");
            return step;
        };

        if !self.launched.contains(unit)
            || self.statuses.state_of(unit) != Some(UnitState::Pending)
        {
            warn!(unit = %unit, run_id, "completion for unit that is not in flight; ignoring");
            return step;
        }

        match outcome {
            UnitOutcome::Success(output) => {
                self.statuses.mark_completed(unit, output);
                info!(unit = %unit, run_id, "unit completed successfully");

                for dependent in self.graph.dependents_of(unit) {
                    if self.try_launch(&dependent) {
                        info!(unit = %dependent, trigger = %unit, run_id, "triggering dependent unit");
                        step.newly_launched.push(dependent);
                    }
                }
            }
            UnitOutcome::Failed(message) => {
                error!(unit = %unit, run_id, error = %message, "unit failed; dependents stay pending");
                self.statuses.mark_failed(unit, message);
                step.newly_failed.push(unit.to_string());
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Units launched in this run whose callback has not reported back yet.
    pub fn in_flight(&self) -> Vec<UnitId> {
        self.statuses
            .iter()
            .filter(|(id, s)| s.state == UnitState::Pending && self.launched.contains(*id))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// No unit is running and no pending unit is eligible.
    pub fn is_quiescent(&self) -> bool {
        self.statuses.iter().all(|(id, status)| {
            status.state != UnitState::Pending
                || (!self.launched.contains(id) && !self.graph.dependencies_met(id, &self.statuses))
        })
    }

    /// Pending units that were never launched in the current or last run.
    pub fn unreached(&self) -> Vec<UnitId> {
        self.statuses
            .iter()
            .filter(|(id, s)| s.state == UnitState::Pending && !self.launched.contains(*id))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Reset every unit to `pending`.
    ///
    /// Registrations and the graph are left untouched. Refused while a run
    /// is active, since in-flight units would otherwise be launched again.
    pub fn reset_all(&mut self) -> Result<()> {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "reset requested while a run is active; refusing");
            return Err(AgentdagError::RunInProgress);
        }
        self.statuses.reset_all();
        self.launched.clear();
        info!("scheduler: all unit statuses reset to pending");
        Ok(())
    }

    /// End the current run even though launched units never reported back.
    ///
    /// Those units stay `pending`. Returns the ids that were still in flight.
    pub fn abandon_run(&mut self) -> Vec<UnitId> {
        let Some(run_id) = self.current_run_id.take() else {
            return Vec::new();
        };
        let stranded = self.in_flight();
        warn!(run_id, ?stranded, "scheduler: run abandoned with units in flight");
        self.launched.clear();
        stranded
    }

    /// Mark `unit` launched if it is pending, not yet launched in this run
    /// and every prerequisite is completed.
    fn try_launch(&mut self, unit: &str) -> bool {
        if self.statuses.state_of(unit) != Some(UnitState::Pending)
            || self.launched.contains(unit)
            || !self.graph.dependencies_met(unit, &self.statuses)
        {
            return false;
        }

        debug!(unit = %unit, run_id = self.current_run_id, "dependencies met; launching");
        self.launched.insert(unit.to_string());
        true
    }

    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() || !self.is_quiescent() {
            return false;
        }

        info!(run_id = self.current_run_id, "scheduler: quiescent; marking run as finished");
        self.current_run_id = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn diamond() -> Scheduler {
        let mut s = Scheduler::new();
        s.register_unit("C", &[]).unwrap();
        s.register_unit("A", &ids(&["C"])).unwrap();
        s.register_unit("B", &ids(&["C"])).unwrap();
        s.register_unit("D", &ids(&["A", "B"])).unwrap();
        s
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut s = Scheduler::new();
        s.register_unit("A", &[]).unwrap();
        assert!(matches!(
            s.register_unit("A", &[]),
            Err(AgentdagError::DuplicateUnit(name)) if name == "A"
        ));
    }

    #[test]
    fn cycle_aborts_before_any_launch() {
        let mut s = Scheduler::new();
        s.register_unit("root", &[]).unwrap();
        s.register_unit("A", &ids(&["C"])).unwrap();
        s.register_unit("B", &ids(&["A"])).unwrap();
        s.register_unit("C", &ids(&["B"])).unwrap();

        let err = s.start_run().unwrap_err();
        assert!(matches!(err, AgentdagError::DependencyCycle(_)));
        assert!(s.is_idle());
        assert!(s.in_flight().is_empty());
        assert_eq!(s.statuses().units_in(UnitState::Pending).len(), 4);
    }

    #[test]
    fn diamond_join_waits_for_every_edge() {
        let mut s = diamond();

        let start = s.start_run().unwrap();
        assert_eq!(start.newly_launched, ids(&["C"]));

        let step = s.handle_completion("C", UnitOutcome::Success(json!("c")));
        assert_eq!(step.newly_launched, ids(&["A", "B"]));

        let step = s.handle_completion("A", UnitOutcome::Success(json!("a")));
        assert!(step.newly_launched.is_empty());

        let step = s.handle_completion("B", UnitOutcome::Success(json!("b")));
        assert_eq!(step.newly_launched, ids(&["D"]));
        assert!(!step.run_just_finished);

        let step = s.handle_completion("D", UnitOutcome::Success(json!("d")));
        assert!(step.run_just_finished);
        assert!(s.is_idle());
        assert_eq!(s.statuses().units_in(UnitState::Completed).len(), 4);
    }

    #[test]
    fn unit_is_launched_at_most_once_per_run() {
        let mut s = diamond();
        s.start_run().unwrap();
        s.handle_completion("C", UnitOutcome::Success(json!("c")));
        s.handle_completion("A", UnitOutcome::Success(json!("a")));
        let first = s.handle_completion("B", UnitOutcome::Success(json!("b")));
        assert_eq!(first.newly_launched, ids(&["D"]));

        // A replayed completion must not launch D a second time.
        let replay = s.handle_completion("B", UnitOutcome::Success(json!("b")));
        assert!(replay.newly_launched.is_empty());
        assert_eq!(s.in_flight(), ids(&["D"]));
    }

    #[test]
    fn failure_leaves_descendants_pending_and_siblings_run() {
        let mut s = Scheduler::new();
        s.register_unit("root", &[]).unwrap();
        s.register_unit("bad", &ids(&["root"])).unwrap();
        s.register_unit("child", &ids(&["bad"])).unwrap();
        s.register_unit("grandchild", &ids(&["child"])).unwrap();
        s.register_unit("good", &ids(&["root"])).unwrap();

        s.start_run().unwrap();
        let step = s.handle_completion("root", UnitOutcome::Success(json!("r")));
        assert_eq!(step.newly_launched, ids(&["bad", "good"]));

        let step = s.handle_completion("bad", UnitOutcome::Failed("boom".into()));
        assert_eq!(step.newly_failed, ids(&["bad"]));
        assert!(step.newly_launched.is_empty());
        assert!(!step.run_just_finished);

        let step = s.handle_completion("good", UnitOutcome::Success(json!("g")));
        assert!(step.run_just_finished);

        assert_eq!(s.unreached(), ids(&["child", "grandchild"]));
        assert_eq!(
            s.statuses().get("bad").unwrap().error.as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn completion_without_launch_is_ignored() {
        let mut s = diamond();
        s.start_run().unwrap();
        let step = s.handle_completion("D", UnitOutcome::Success(json!("early")));
        assert_eq!(step, SchedulerStep::default());
        assert_eq!(s.statuses().state_of("D"), Some(UnitState::Pending));
    }

    #[test]
    fn reset_allows_a_fresh_run() {
        let mut s = diamond();
        s.start_run().unwrap();
        s.handle_completion("C", UnitOutcome::Failed("x".into()));
        assert!(s.is_idle());

        s.reset_all().unwrap();
        assert!(s.statuses().iter().all(|(_, st)| st.state == UnitState::Pending));

        let again = s.start_run().unwrap();
        assert_eq!(again.newly_launched, ids(&["C"]));
    }

    #[test]
    fn active_run_refuses_second_start_and_reset() {
        let mut s = diamond();
        let first = s.start_run().unwrap();
        assert_eq!(first.newly_launched, ids(&["C"]));

        assert!(matches!(s.start_run(), Err(AgentdagError::RunInProgress)));
        assert!(matches!(s.reset_all(), Err(AgentdagError::RunInProgress)));
        assert_eq!(s.in_flight(), ids(&["C"]));
        assert_eq!(s.last_run_id(), 1);

        // The original run still completes normally.
        let step = s.handle_completion("C", UnitOutcome::Success(json!("c")));
        assert_eq!(step.newly_launched, ids(&["A", "B"]));
    }

    #[test]
    fn abandoned_run_frees_the_scheduler() {
        let mut s = diamond();
        s.start_run().unwrap();

        assert_eq!(s.abandon_run(), ids(&["C"]));
        assert!(s.is_idle());
        assert!(s.abandon_run().is_empty());

        s.reset_all().unwrap();
        let again = s.start_run().unwrap();
        assert_eq!(again.newly_launched, ids(&["C"]));
        assert_eq!(s.last_run_id(), 2);
    }

    #[test]
    fn empty_scheduler_finishes_immediately() {
        let mut s = Scheduler::new();
        let step = s.start_run().unwrap();
        assert!(step.newly_launched.is_empty());
        assert!(step.run_just_finished);
    }
}
