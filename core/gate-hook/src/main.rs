//! gate-hook: hook process that enforces orchestration and delegation workflows.
//!
//! Called by the host's hook configuration on every lifecycle and tool event.
//! Each invocation is a fresh process; state lives in files managed by gate-core.
//!
//! ## Subcommands
//!
//! - `handle`: Main hook handler, reads JSON from stdin, answers JSON on stdout
//! - `delegation`, `orchestration`: Drive a workflow by hand
//! - `status`: Show a session's workflows
//! - `sweep`: Run the cleanup sweep now
//! - `recovery`: List or restore archived workflows

mod commands;
mod handle;
mod input;
mod logging;

use clap::{Parser, Subcommand};
use gate_core::storage::StorageConfig;
use gate_core::GateEngine;

use commands::{DelegationOp, HookError, OrchestrationOp, RecoveryOp};

#[derive(Parser)]
#[command(name = "gate-hook")]
#[command(about = "Workflow gate for assistant hooks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle,

    /// Delegated-execution workflow operations
    Delegation {
        #[arg(long)]
        session: String,
        #[command(subcommand)]
        op: DelegationOp,
    },

    /// Discovery-gated orchestration operations
    Orchestration {
        #[arg(long)]
        session: String,
        #[command(subcommand)]
        op: OrchestrationOp,
    },

    /// Print workflow status for a session
    Status {
        #[arg(long)]
        session: String,
    },

    /// Remove expired state, stale locks, and orphaned temp files
    Sweep,

    /// Archived workflows from ended sessions
    Recovery {
        #[command(subcommand)]
        op: RecoveryOp,
    },
}

fn main() {
    let storage = StorageConfig::default();
    let _logging_guard = logging::init(&storage);
    let cli = Cli::parse();

    if let Commands::Handle = cli.command {
        // The host must always get an answer; on failure, allow.
        if let Err(e) = handle::run() {
            tracing::error!(error = %e, "gate-hook handle failed");
            if let Err(e) = handle::emit(&handle::HookResponse::allow()) {
                tracing::error!(error = %e, "Failed to write fallback response");
            }
        }
        return;
    }

    let engine = GateEngine::with_storage(storage, Default::default());
    let result: Result<(), HookError> = match cli.command {
        Commands::Handle => Ok(()),
        Commands::Delegation { session, op } => commands::delegation(&engine, &session, op),
        Commands::Orchestration { session, op } => commands::orchestration(&engine, &session, op),
        Commands::Status { session } => commands::print_json(&engine.status(&session)),
        Commands::Sweep => commands::print_json(&engine.sweep()),
        Commands::Recovery { op } => commands::recovery(&engine, op),
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "gate-hook command failed");
        eprintln!("gate-hook: {}", e);
        std::process::exit(1);
    }
}
