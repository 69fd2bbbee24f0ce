mod config;
mod simulate;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use pulsegate_safety::SafetyArbiter;
use tracing::info;

use config::PulsegateConfig;

/// Pulsegate event routing and action execution core.
#[derive(Parser, Debug)]
#[command(name = "pulsegate", about = "Event routing and action execution core for live-streaming helper hubs")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pulsegate.toml", env = "PULSEGATE_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a fixed sequence of synthetic events through the pipeline
    /// against an in-memory mock device backend, then print what it
    /// recorded. Does not touch the network.
    Simulate,
    /// Run the dispatcher worker pool against a real REST device backend,
    /// waiting for events supplied by an embedding ingress adapter.
    ///
    /// This binary has no ingress adapter of its own (out of scope); this
    /// subcommand exists to demonstrate wiring a `Core` to
    /// `pulsegate_device::RestDeviceBackend` and exits immediately after
    /// confirming the backend is reachable.
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PulsegateConfig::load(&cli.config)?;

    match cli.command {
        Command::Simulate => {
            let safety = Arc::new(SafetyArbiter::new(config.safety_config()));
            simulate::run(safety, config.dispatcher_config()).await;
        }
        Command::Serve => {
            run_serve(&config).await?;
        }
    }

    Ok(())
}

async fn run_serve(config: &PulsegateConfig) -> Result<(), Box<dyn std::error::Error>> {
    let base_url = config.device.base_url.clone().unwrap_or_else(|| "http://localhost:8181".to_owned());
    let bearer_token = config.device.bearer_token.clone().unwrap_or_default();

    let backend = pulsegate_device::RestDeviceBackend::new(pulsegate_device::RestDeviceBackendConfig::new(base_url, bearer_token))?;
    let safety = Arc::new(SafetyArbiter::new(config.safety_config()));
    let core = pulsegate_router::Core::spawn(safety, Arc::new(backend), config.dispatcher_config());

    info!("pulsegate: core wired to REST device backend, waiting for shutdown signal");
    shutdown_signal().await;
    core.shutdown();
    info!("pulsegate: shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
