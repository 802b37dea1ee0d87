// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::engine::Manager;

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds every watcher and runs them until Ctrl-C /
/// SIGTERM. With `--dry-run` it prints what would be watched and run
/// instead.
pub async fn run(args: CliArgs) -> Result<()> {
    let manager = Manager::new(&args.config, args.args.clone())
        .with_context(|| format!("building watchers from {}", args.config.display()))?;

    if args.dry_run {
        print_dry_run(&manager);
        return Ok(());
    }

    info!(
        config = %args.config.display(),
        units = manager.len(),
        args = ?manager.args(),
        "hotrunner starting"
    );
    manager.run().await;
    info!("hotrunner exited");
    Ok(())
}

/// Print each watcher's settings, steps and resolved files.
fn print_dry_run(manager: &Manager) {
    println!("hotrunner dry-run");
    println!("watchers ({}):", manager.len());

    for watcher in manager.watchers() {
        let unit = watcher.unit();
        let meta = unit.meta();
        println!("  - {}", watcher.name());
        println!("      type: {}", watcher.kind());
        println!("      quiet period: {:?}", meta.quiet_period);
        println!("      steps: {:?}", unit.step_names());
        for dir in &meta.directories {
            println!("      directory: {}", dir.path.display());
            println!("        includes: {:?}", dir.includes);
            if !dir.excludes.is_empty() {
                println!("        excludes: {:?}", dir.excludes);
            }
            println!("        recursive: {}", dir.recursive);
        }
        println!("      files ({}):", unit.files().len());
        for file in unit.files() {
            println!("        {}", file.display());
        }
    }

    debug!("dry-run complete (no execution)");
}
