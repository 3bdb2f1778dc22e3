// src/dag/graph.rs

use std::collections::HashMap;

use crate::dag::status::StatusRegistry;
use crate::types::{UnitId, UnitState};

/// DFS colouring used by cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// In-memory dependency relation keyed by unit id.
///
/// Each unit maps to the ordered list of its prerequisites. Units are kept in
/// the order they were first seen so that dependents are reported in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<UnitId>,
    deps: HashMap<UnitId, Vec<UnitId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `unit` is a node of the graph, even without prerequisites.
    pub fn add_unit(&mut self, unit: &str) {
        if !self.deps.contains_key(unit) {
            self.deps.insert(unit.to_string(), Vec::new());
            self.order.push(unit.to_string());
        }
    }

    /// Append `prerequisite` to the dependency list of `unit`.
    ///
    /// Duplicates are kept; they do not change satisfaction or cycle results.
    pub fn add_dependency(&mut self, unit: &str, prerequisite: &str) {
        self.add_unit(unit);
        if let Some(list) = self.deps.get_mut(unit) {
            list.push(prerequisite.to_string());
        }
    }

    /// All units with a dependency entry, in registration order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.deps.contains_key(unit)
    }

    /// Immediate prerequisites of a unit.
    pub fn dependencies_of(&self, unit: &str) -> &[UnitId] {
        self.deps.get(unit).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Every unit whose dependency list contains `unit`, in registration order.
    pub fn dependents_of(&self, unit: &str) -> Vec<UnitId> {
        self.order
            .iter()
            .filter(|candidate| self.dependencies_of(candidate).iter().any(|d| d == unit))
            .cloned()
            .collect()
    }

    /// True iff every declared prerequisite of `unit` has a status entry in
    /// state `completed`. Units without prerequisites are always eligible.
    pub fn dependencies_met(&self, unit: &str, statuses: &StatusRegistry) -> bool {
        self.dependencies_of(unit).iter().all(|dep| {
            statuses
                .get(dep)
                .is_some_and(|status| status.state == UnitState::Completed)
        })
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Iterative three-colour DFS over every registered unit.
    ///
    /// Returns the unit at which a back-edge to an in-progress node was found.
    /// Prerequisites that were never registered are treated as leaves.
    pub fn find_cycle(&self) -> Option<UnitId> {
        let mut color: HashMap<&str, Color> = HashMap::new();

        for start in &self.order {
            if color.get(start.as_str()).copied().unwrap_or(Color::Unvisited) != Color::Unvisited {
                continue;
            }

            color.insert(start.as_str(), Color::InProgress);
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let deps = self.dependencies_of(node);

                if next < deps.len() {
                    frame.1 += 1;
                    let dep = deps[next].as_str();
                    match color.get(dep).copied().unwrap_or(Color::Unvisited) {
                        Color::InProgress => return Some(dep.to_string()),
                        Color::Done => {}
                        Color::Unvisited => {
                            color.insert(dep, Color::InProgress);
                            stack.push((dep, 0));
                        }
                    }
                } else {
                    color.insert(node, Color::Done);
                    stack.pop();
                }
            }
        }

        None
    }
}
