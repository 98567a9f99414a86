// src/main.rs
use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use hotswap_lb::{
    config,
    lifecycle::{self, ControlSignal, PidFile},
    load_balancer::LoadBalancer,
    metrics::{start_metrics_server, MetricsRegistry},
    proxy::Proxy,
    server::{RequestHandler, ServerBuilder},
};

#[derive(Debug, Parser)]
#[command(name = "hotswap-lb", version)]
#[command(about = "Round-robin HTTP load balancer with hot-reloadable backends")]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// PID file of the running instance
    #[arg(long, default_value = "hotswap-lb.pid")]
    pid_file: PathBuf,

    /// Tell the running instance to reload its backends
    #[arg(long, conflicts_with = "stop")]
    reload: bool,

    /// Tell the running instance to stop
    #[arg(long)]
    stop: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hotswap_lb=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if cli.reload {
        return signal_running_instance(&cli.pid_file, ControlSignal::Reload);
    }
    if cli.stop {
        return signal_running_instance(&cli.pid_file, ControlSignal::Stop);
    }

    run(cli).await
}

fn signal_running_instance(pid_file: &Path, signal: ControlSignal) -> Result<()> {
    let pid = lifecycle::read_pid(pid_file)?;
    lifecycle::send_signal(pid, signal)?;
    info!(pid, ?signal, "Signal sent to running load balancer");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    info!("Loading configuration from: {}", cli.config.display());
    let config = config::load_config(&cli.config).await?;
    let listen = config.listen_addr()?;
    info!(
        listen = %listen,
        strategy = %config.strategy,
        backends = ?config.backends,
        "Configuration loaded"
    );

    let _pid_file = PidFile::create(&cli.pid_file)?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    // Build the engine; this also starts the health checker
    let balancer = Arc::new(
        LoadBalancer::builder()
            .with_algorithm(config.algorithm())
            .with_health_check(config.health_check.clone())
            .with_metrics(metrics.clone())
            .build(&config.backends),
    );

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(
            metrics_addr,
            metrics_registry,
            config.metrics.path.clone(),
            balancer.clone(),
        )?;
    }

    #[cfg(unix)]
    lifecycle::spawn_reload_listener(balancer.clone(), cli.config.clone())?;

    let proxy = Arc::new(Proxy::new(balancer).with_metrics(metrics));
    let handler = RequestHandler::new(proxy);

    info!(pid = std::process::id(), "Starting load balancer on {}", listen);

    ServerBuilder::new(listen)
        .with_handler(handler)
        .serve_with_shutdown(lifecycle::shutdown_signal())
        .await?;

    info!("Load balancer stopped");
    Ok(())
}
