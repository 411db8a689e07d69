//! # Vault Sync Controller
//!
//! Mirrors Vault KV secrets into Kubernetes Secrets and ConfigMaps on a fixed
//! interval.
//!
//! ## Configuration
//!
//! - `VK_VAULT_ROOT_MOUNT_PATH` (required): Vault path to walk
//! - `VK_SYNC_PERIOD`: seconds between passes (default 300)
//! - `VK_DELETE_OLD`: delete orphaned objects (default true)
//! - `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`: Vault connection
//!
//! See [`vault_sync_controller::config::SyncConfig`] for the full list.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info};
use vault_sync_controller::cli::{Cli, Command};
use vault_sync_controller::config::SyncConfig;
use vault_sync_controller::observability::{logging, metrics};
use vault_sync_controller::runtime::{run_pass, shutdown_signal, Scheduler};
use vault_sync_controller::server::{start_server, ServerState};
use vault_sync_controller::source::{TreeWalker, VaultReader};
use vault_sync_controller::target::KubeTargetStore;
use vault_sync_controller::ReconcileDriver;

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ when no default provider is selected via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let config = SyncConfig::from_env().context("Invalid configuration")?;
    logging::init_logging(&config.log_level, &config.log_format)?;

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        dry_run = cli.dry_run,
        "Starting Vault Sync Controller"
    );

    metrics::register_metrics()?;

    let reader = VaultReader::new(&config.vault)?;
    let walker = TreeWalker::new(Arc::new(reader))
        .with_unknown_kind_warnings(config.warn_on_unknown_kinds);

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let target = KubeTargetStore::new(client, &config.manager_name).with_dry_run(cli.dry_run);

    let driver = ReconcileDriver::new(
        walker,
        Arc::new(target),
        &config.root_path,
        config.delete_orphans,
    );

    match cli.command_or_default() {
        Command::Once => {
            run_pass(&driver, 1).await?;
        }
        Command::Run => {
            let server_state = Arc::new(ServerState::default());
            let server_state_clone = Arc::clone(&server_state);
            let port = config.metrics_port;
            tokio::spawn(async move {
                if let Err(e) = start_server(port, server_state_clone).await {
                    error!("HTTP server error: {}", e);
                }
            });

            Scheduler::new(driver, config.sync_period)
                .with_exit_on_pass_error(config.exit_on_pass_error)
                .with_pass_state(Arc::clone(&server_state.passes))
                .run_until(shutdown_signal())
                .await?;
        }
    }

    info!("Controller stopped");
    Ok(())
}
