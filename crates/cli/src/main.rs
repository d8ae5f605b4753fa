// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vc - autonomous work executor CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;

use clap::{Parser, Subcommand};
use commands::{activity, cleanup, doctor, execute, init, pause, stale, status, stop, tail};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vc",
    version,
    about = "vc - an autonomous executor for your issue backlog"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the executor daemon (or one task with --polecat-mode)
    Execute(execute::ExecuteArgs),
    /// Stop running executor instances
    Stop(stop::StopArgs),
    /// Show executor and store status
    Status,
    /// Report (and optionally release) stale claims
    Stale(stale::StaleArgs),
    /// Show recent agent events
    Activity(activity::ActivityArgs),
    /// Tail agent events
    Tail(tail::TailArgs),
    /// Maintenance: prune branches or events
    Cleanup(cleanup::CleanupArgs),
    /// Diagnose (and optionally repair) the store
    Doctor(doctor::DoctorArgs),
    /// Create an empty database for this project
    Init,
    /// Pause an in-progress issue (checkpoint + release)
    Pause(pause::PauseArgs),
    /// Resume a paused issue
    Resume(pause::ResumeArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("error: cannot change to {}: {e}", dir.display());
            std::process::exit(1);
        }
    }

    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: cannot determine working directory: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Execute(args) => execute::run(&project_root, args).await,
        Commands::Stop(args) => stop::run(&project_root, args).await,
        Commands::Status => status::run(&project_root).await,
        Commands::Stale(args) => stale::run(&project_root, args),
        Commands::Activity(args) => activity::run(&project_root, args),
        Commands::Tail(args) => tail::run(&project_root, args).await,
        Commands::Cleanup(args) => cleanup::run(&project_root, args).await,
        Commands::Doctor(args) => doctor::run(&project_root, args),
        Commands::Init => init::run(&project_root),
        Commands::Pause(args) => pause::run_pause(&project_root, args).await,
        Commands::Resume(args) => pause::run_resume(&project_root, args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => e.exit(),
    }
}
