// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PipelineConfig, RawPipelineConfig};
use crate::errors::{AgentdagError, Result};

impl TryFrom<RawPipelineConfig> for PipelineConfig {
    type Error = AgentdagError;

    fn try_from(raw: RawPipelineConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let order = dependency_order(&raw)?;
        Ok(PipelineConfig::new_unchecked(raw, order))
    }
}

fn validate_raw_config(cfg: &RawPipelineConfig) -> Result<()> {
    ensure_has_units(cfg)?;
    validate_global_config(cfg)?;
    validate_unit_kinds(cfg)?;
    validate_unit_dependencies(cfg)?;
    validate_bindings(cfg)?;
    validate_assembly(cfg)?;
    Ok(())
}

fn ensure_has_units(cfg: &RawPipelineConfig) -> Result<()> {
    if cfg.unit.is_empty() {
        return Err(AgentdagError::ConfigError(
            "config must contain at least one [unit.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawPipelineConfig) -> Result<()> {
    if cfg.config.max_in_flight == Some(0) {
        return Err(AgentdagError::ConfigError(
            "[config].max_in_flight must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_unit_kinds(cfg: &RawPipelineConfig) -> Result<()> {
    for (name, unit) in cfg.unit.iter() {
        match (&unit.cmd, &unit.template) {
            (Some(_), None) | (None, Some(_)) => {}
            (Some(_), Some(_)) => {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' sets both `cmd` and `template`",
                    name
                )));
            }
            (None, None) => {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' must set one of `cmd` or `template`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_unit_dependencies(cfg: &RawPipelineConfig) -> Result<()> {
    for (name, unit) in cfg.unit.iter() {
        for dep in unit.after.iter() {
            if !cfg.unit.contains_key(dep) {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
        for aliased in unit.aliases.keys() {
            if !unit.after.contains(aliased) {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' aliases output of '{}', which is not in `after`",
                    name, aliased
                )));
            }
        }
    }
    Ok(())
}

fn validate_bindings(cfg: &RawPipelineConfig) -> Result<()> {
    for (name, unit) in cfg.unit.iter() {
        let Some(shared) = &unit.shared else {
            continue;
        };
        for field in unit.required.iter() {
            if !shared.contains(field) {
                return Err(AgentdagError::ConfigError(format!(
                    "unit '{}' requires '{}' but does not list it in `shared`",
                    name, field
                )));
            }
        }
    }
    Ok(())
}

fn validate_assembly(cfg: &RawPipelineConfig) -> Result<()> {
    let sections: HashSet<&str> = cfg
        .unit
        .values()
        .filter_map(|u| u.section.as_deref())
        .collect();

    // Without explicit sections, every unit id is a section id.
    let known = |id: &str| {
        if sections.is_empty() {
            cfg.unit.contains_key(id)
        } else {
            sections.contains(id)
        }
    };

    for id in cfg.assembly.order.iter() {
        if !known(id) {
            return Err(AgentdagError::ConfigError(format!(
                "[assembly].order names unknown section '{}'",
                id
            )));
        }
    }
    Ok(())
}

/// Topological order of units; fails if the dependency graph has a cycle.
fn dependency_order(cfg: &RawPipelineConfig) -> Result<Vec<String>> {
    // Edge direction: dep -> unit
    // For:
    //   [unit.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.unit.keys() {
        graph.add_node(name.as_str());
    }

    for (name, unit) in cfg.unit.iter() {
        for dep in unit.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(AgentdagError::DependencyCycle(format!(
            "cycle detected in unit graph involving unit '{}'",
            cycle.node_id()
        ))),
    }
}
