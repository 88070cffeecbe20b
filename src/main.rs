//! voxstream server binary entry point.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use voxstream::cli::Cli;
use voxstream::config::VoiceConfig;
use voxstream::server::{self, AppState};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "voxstream exited with an error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> voxstream::error::Result<()> {
    let mut config = VoiceConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    tracing::debug!(?config, "Configuration loaded");

    let listener = TcpListener::bind(config.bind_addr).await?;
    let state = AppState::from_config(config);
    let store = state.store.clone();

    store.start();
    let result = server::serve(listener, state, shutdown_signal()).await;
    store.stop();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
