use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use record_relay::{Args, HeadlessRecorder, RecordingController, Router, ServerConfig, server};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();

    let config = ServerConfig::try_from(Args::parse())?;

    let mut recorder = HeadlessRecorder::new(&config.output);
    if config.start_recording {
        recorder.start().context("failed to start recording")?;
        info!(output = %config.output.display(), "recording started");
    }

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("could not listen on {}", config.addr))?;

    server::run(listener, Router::new(recorder), shutdown_signal()).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
