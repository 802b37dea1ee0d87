// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `hotrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotrunner",
    version,
    about = "Rebuild and rerun commands when watched files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(short, long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Log everything (same as `--log-level trace`).
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `-v`, then `HOTRUNNER_LOG`, then `info` decide.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load the config and resolve file sets, print them, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Free-form arguments, kept available to the watchers.
    #[arg(trailing_var_arg = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
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
