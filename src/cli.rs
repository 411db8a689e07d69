//! # Command Line
//!
//! `vault-sync-controller` runs the sync loop by default; `once` runs a
//! single pass and exits with its result.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "vault-sync-controller")]
#[command(about = "Mirror Vault KV secrets into Kubernetes Secrets and ConfigMaps", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Send every Kubernetes write and delete as a server-side dry run
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Reconcile on the configured interval until terminated (default)
    Run,
    /// Run a single reconciliation pass and exit
    Once,
}

impl Cli {
    /// The requested subcommand, `run` when none is given
    pub fn command_or_default(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}
