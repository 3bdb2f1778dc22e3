// src/lib.rs

pub mod assembly;
pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::{Context as _, Result};
use serde_json::Map;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{PipelineConfig, load_and_validate, load_input};
use crate::engine::{Orchestrator, RunReport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and validation
/// - seeding the shared context from `--input`
/// - the orchestrator (scheduler, units, assembly, recovery)
/// - writing the artifact to stdout or `--output`
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let seed = match &args.input {
        Some(path) => load_input(path)?,
        None => Map::new(),
    };

    let orchestrator = Orchestrator::from_config(&cfg)?;
    info!(
        units = cfg.unit.len(),
        roots = ?cfg.roots(),
        seed_keys = seed.len(),
        "starting pipeline"
    );

    let report = orchestrator.run(seed).await?;
    log_statuses(&report);

    let rendered = serde_json::to_string_pretty(&report.artifact)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("failed to write artifact to {path}"))?;
            info!(path = %path, "artifact written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn log_statuses(report: &RunReport) {
    for view in &report.statuses {
        info!(
            unit = %view.unit_id,
            state = %view.state,
            at = %view.timestamp.to_rfc3339(),
            "final status"
        );
    }
    info!(
        run_id = report.summary.run_id,
        sections = report.artifact.sections.len(),
        "pipeline complete"
    );
}

/// Simple dry-run output: print units, deps, kinds and bindings.
fn print_dry_run(cfg: &PipelineConfig) {
    println!("agentdag dry-run");
    match cfg.config.max_in_flight {
        Some(max) => println!("  config.max_in_flight = {max}"),
        None => println!("  config.max_in_flight = unbounded"),
    }
    if !cfg.assembly.order.is_empty() {
        println!("  assembly.order = {:?}", cfg.assembly.order);
    }
    println!();

    println!("units ({}):", cfg.unit.len());
    for name in cfg.unit_order() {
        let Some(unit) = cfg.unit.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      kind: {}", unit.kind_label());
        if !unit.after.is_empty() {
            println!("      after: {:?}", unit.after);
        }
        if let Some(ref shared) = unit.shared {
            println!("      shared: {:?}", shared);
        }
        if !unit.required.is_empty() {
            println!("      required: {:?}", unit.required);
        }
        for (dep, key) in &unit.aliases {
            println!("      alias: {dep} -> {key}");
        }
        if let Some(ref section) = unit.section {
            println!("      section: {section}");
        }
    }

    debug!("dry-run complete (no execution)");
}
