//! Molt: the memory and self-evolution layer for AI coding agents
//!
//! **Molt is the local-first persistence layer an agent harness uses to learn
//! from itself.** It stores reusable task patterns ("skills"), compresses long
//! interaction histories into bounded summaries, and carries changes to its
//! own behavioral configuration through a guarded propose/apply/rollback
//! lifecycle.
//!
//! # Core Principles
//!
//! - **Local-first**: all state is plain files under one store root,
//!   versioned by backups, auditable via the mutation log
//! - **Guarded mutation**: configuration never changes without a proposal,
//!   a pre-write snapshot, and a history entry
//! - **Single-step undo**: the most recent history entry is the sole
//!   rollback target
//! - **Heuristic, not clever**: matching is lexical overlap and cost
//!   estimation is four characters per token
//!
//! # Architecture
//!
//! Three subsystems, bottom-up:
//!
//! - `memory` (skills): durable skill collection with trigger-based retrieval
//! - `context`: head/summary/tail transcript compression feeding a rolling
//!   cross-session digest
//! - `evolve`: analysis-driven proposals applied through backup -> mutate ->
//!   record, with rollback from the latest snapshot
//!
//! The skill and proposal/history collections are independent line-oriented
//! stores; the pipeline references skills by id only, and the digest depends
//! on neither.
//!
//! # Examples
//!
//! ```bash
//! # Initialize a store
//! molt init
//!
//! # Record a completed session outcome
//! molt memory capture --file outcome.json
//!
//! # Retrieve skills for a new task
//! molt memory recall --task "implement user authentication"
//!
//! # Generate proposals from the latest analysis, then apply one
//! molt evolve propose --analysis latest_analysis.json
//! molt evolve apply --id prop_01J8...
//!
//! # Undo the most recent applied change
//! molt evolve rollback
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store handle, config, errors, line store, audit log, time
//! - [`plugins`]: subsystem implementations (skills, compress, evolve)

pub mod core;
pub mod plugins;

mod subsystems;

use crate::core::{config, error, store::Store};
use crate::plugins::{compress, evolve, skills};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "molt",
    version = env!("CARGO_PKG_VERSION"),
    about = "The memory and self-evolution layer for AI coding agents"
)]
struct Cli {
    /// Store root (overrides MOLT_HOME and config.toml; defaults to ~/.molt/data).
    #[clap(long, global = true)]
    root: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the store layout
    Init,
    /// Print version
    Version,
    /// Capture and retrieve reusable task patterns
    Memory(skills::MemoryCli),
    /// Compress transcripts and inspect the rolling digest
    Context(compress::ContextCli),
    /// Propose, apply and roll back harness changes
    Evolve(evolve::EvolveCli),
    /// Print subsystem manifests
    Schema {
        /// Filter by subsystem name
        #[clap(long)]
        subsystem: Option<String>,
    },
}

fn print_schemas(filter: Option<&str>) {
    let manifests = [skills::schema(), compress::schema(), evolve::schema()];
    let shown: Vec<&serde_json::Value> = manifests
        .iter()
        .filter(|m| filter.is_none_or(|f| m["name"] == f))
        .collect();
    println!("{}", serde_json::to_string_pretty(&shown).unwrap_or_default());
}

pub fn run() -> Result<(), error::MoltError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Schema { ref subsystem } => {
            print_schemas(subsystem.as_deref());
            Ok(())
        }
        _ => {
            let root = config::resolve_data_root(cli.root)?;
            let store = Store::open(&root)?;
            subsystems::initialize_all(&store.root)?;

            match cli.command {
                Command::Init => {
                    use colored::Colorize;
                    println!("{}", "molt 🦀 store initialized".bold());
                    println!("  root:      {}", store.root.display());
                    println!("  skills:    {}", store.skills_path().display());
                    println!("  digest:    {}", store.digest_path().display());
                    println!("  proposals: {}", store.proposals_path().display());
                    println!("  history:   {}", store.history_path().display());
                    println!("  backups:   {}", store.backups_dir().display());
                    Ok(())
                }
                Command::Memory(memory_cli) => skills::run_memory_cli(&store, memory_cli),
                Command::Context(context_cli) => compress::run_context_cli(&store, context_cli),
                Command::Evolve(evolve_cli) => evolve::run_evolve_cli(&store, evolve_cli),
                Command::Version | Command::Schema { .. } => unreachable!(),
            }
        }
    }
}
