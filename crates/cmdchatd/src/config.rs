//! Server configuration (component L): CLI flags layered over environment
//! variables, resolved once at process start. There is no config file —
//! the protocol this daemon implements names only flags and env vars
//! (see DESIGN.md's "config file" Open Question resolution).

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cmdchatd", about = "In-memory, room-based chat broker")]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 5050)]
    pub port: u16,

    #[arg(long)]
    pub certfile: Option<PathBuf>,

    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Metrics tick interval in seconds; 0 disables the ticker.
    #[arg(long, default_value_t = 0)]
    pub metrics_interval: u64,
}

/// Fully resolved server configuration.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,
    pub metrics_interval: u64,
    pub tokens: HashSet<String>,
    pub metrics_json: bool,
}

impl Config {
    pub fn resolve() -> Self {
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> Self {
        let tokens = parse_tokens(std::env::var("CMDCHAT_TOKENS").ok().as_deref());
        let metrics_json = std::env::var("CMDCHAT_METRICS_JSON").is_ok();
        Self {
            host: cli.host,
            port: cli.port,
            certfile: cli.certfile,
            keyfile: cli.keyfile,
            metrics_interval: cli.metrics_interval,
            tokens,
            metrics_json,
        }
    }
}

/// Parses `CMDCHAT_TOKENS`: comma-separated, trimmed, empty entries dropped.
/// An absent or empty variable disables authentication (empty result set).
fn parse_tokens(raw: Option<&str>) -> HashSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
