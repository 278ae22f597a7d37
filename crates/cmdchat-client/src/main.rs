//! cmdchat — the terminal client for cmdchatd.
//!
//! Grounded on `cmdchatd::main`'s shape (`tracing_subscriber` init from an
//! env var with a fallback, resolve config, run); the client has no
//! listener or metrics ticker to additionally wire, so it boils down to
//! config resolution followed by the transport core's reconnect loop.

mod commands;
mod config;
mod error;
mod file_transfer;
mod history;
mod renderer;
mod tls;
mod transport;

use anyhow::Result;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("CMDCHAT_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::resolve()?;
    transport::run(config).await
}
