//! cmdchatd — in-memory, room-based chat broker.
//!
//! Grounded on `summitd::main`'s shape: `tracing_subscriber` init from
//! `RUST_LOG`, spawn the long-running tasks, `tokio::select!` on whichever
//! exits first. This daemon additionally wires a `tokio::sync::watch`
//! shutdown channel from SIGINT/SIGTERM into the acceptor and metrics
//! ticker, which `summitd` does not need since it has no listener to close.

mod acceptor;
mod config;
mod dispatch;
mod error;
mod handlers;
mod handshake;
mod heartbeat;
mod metrics;
mod tls;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cmdchat_services::registry::Registry;

use config::Config;
use metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("CMDCHAT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::resolve();
    tracing::info!(host = %config.host, port = config.port, "cmdchatd starting");

    let tls_acceptor = tls::load_acceptor(config.certfile.as_deref(), config.keyfile.as_deref())?;
    if tls_acceptor.is_some() {
        tracing::info!("TLS enabled");
    }

    let registry = Registry::new();
    let metrics = Metrics::new();
    let tokens = Arc::new(config.tokens);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let acceptor_task = tokio::spawn(acceptor::run(
        config.host.clone(),
        config.port,
        tls_acceptor,
        registry.clone(),
        metrics.clone(),
        tokens,
        shutdown_rx.clone(),
    ));

    let metrics_task = if config.metrics_interval > 0 {
        Some(tokio::spawn(metrics::run(
            metrics.clone(),
            registry.clone(),
            Duration::from_secs(config.metrics_interval),
            config.metrics_json,
            shutdown_rx.clone(),
        )))
    } else {
        None
    };

    tokio::select! {
        result = acceptor_task => {
            match result {
                Ok(Ok(())) => tracing::info!("acceptor exited cleanly"),
                Ok(Err(e)) => tracing::error!(error = %e, "acceptor exited with an error"),
                Err(e) => tracing::error!(error = %e, "acceptor task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    }

    if let Some(metrics_task) = metrics_task {
        let _ = metrics_task.await;
    }

    Ok(())
}
