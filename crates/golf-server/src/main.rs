//! golf-server entry point.
//!
//! Connects to the Docker daemon, opens the highscore database and serves
//! the HTTP API until interrupted.

use anyhow::Context;
use golf_core::{SandboxController, SqliteLedger, SubmissionService};
use golf_sandbox::DockerRuntime;
use golf_server::{http, GolfConfig, GolfServer};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("golf_server=info".parse()?)
                .add_directive("golf_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting golf server");

    // Load configuration from environment
    let config = GolfConfig::from_env();
    tracing::info!(?config, "Configuration loaded");
    config.validate_warn();
    let challenge = config.challenge()?;

    // Container runtime
    let runtime = DockerRuntime::connect().context("connecting to Docker")?;
    if let Err(e) = runtime.ping().await {
        // Submissions report SandboxUnavailable until the daemon is back.
        tracing::warn!(error = %e, "Docker daemon not reachable");
    }

    let ledger = SqliteLedger::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    let service = SubmissionService::new(
        SandboxController::new(Arc::new(runtime)),
        ledger,
        challenge,
    );
    let server = GolfServer::new(service);
    tracing::info!(
        challenge = server.challenge_id(),
        http_addr = %config.http_addr,
        "Server ready"
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Received shutdown signal, draining requests...");
    };

    http::serve(server, config.http_addr, shutdown).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
