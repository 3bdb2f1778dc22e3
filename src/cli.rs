// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::default_config_path;

/// Command-line arguments for `agentdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agentdag",
    version,
    about = "Run dependent units of work in dependency order and assemble their outputs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// JSON object used to seed the shared context.
    #[arg(long, value_name = "PATH")]
    pub input: Option<String>,

    /// Write the assembled artifact here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AGENTDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the unit graph, but don't run any unit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
