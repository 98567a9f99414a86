//! OS signal handling.
//!
//! SIGHUP reloads the backend list from the config file; SIGINT and SIGTERM
//! stop the server. `--reload` and `--stop` deliver those signals to a running
//! instance found through its PID file.

use crate::config::load_config;
use crate::load_balancer::LoadBalancer;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tokio::signal;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Reload,
    Stop,
}

impl ControlSignal {
    fn kill_flag(self) -> &'static str {
        match self {
            ControlSignal::Reload => "-HUP",
            ControlSignal::Stop => "-TERM",
        }
    }
}

pub fn send_signal(pid: u32, signal: ControlSignal) -> Result<()> {
    let status = Command::new("kill")
        .arg(signal.kill_flag())
        .arg(pid.to_string())
        .status()
        .context("Failed to run kill")?;

    if !status.success() {
        bail!("Failed to signal process {} ({})", pid, status);
    }
    Ok(())
}

/// Re-reads the config file and swaps in its backend list. On error the
/// current set stays in service.
pub async fn reload_backends(balancer: &LoadBalancer, config_path: &Path) -> Result<usize> {
    let config = load_config(config_path).await?;
    Ok(balancer.update_backends(&config.backends))
}

#[cfg(unix)]
pub fn spawn_reload_listener(
    balancer: std::sync::Arc<LoadBalancer>,
    config_path: std::path::PathBuf,
) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading {}", config_path.display());
            match reload_backends(&balancer, &config_path).await {
                Ok(count) => info!(backends = count, "Hot reload complete"),
                Err(err) => error!("Reload failed, keeping previous backends: {:#}", err),
            }
        }
    }))
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
