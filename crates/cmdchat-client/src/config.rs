//! Client configuration (component L, client half): the full CLI surface
//! from §6, resolved once at startup. Grounded on the original's
//! `client_cli.py::parse_args`, reimplemented as a `clap` derive struct.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cmdchat", about = "Connect to a cmdchat server")]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 5050)]
    pub port: u16,

    #[arg(long, default_value = "anonymous")]
    pub name: String,

    #[arg(long, default_value = "lobby")]
    pub room: String,

    #[arg(long)]
    pub token: Option<String>,

    #[arg(long, default_value = "rich", value_parser = ["rich", "minimal", "json"])]
    pub renderer: String,

    #[arg(long, default_value_t = 200)]
    pub buffer_size: i64,

    #[arg(long)]
    pub quiet_reconnect: bool,

    #[arg(long)]
    pub history_file: Option<PathBuf>,

    #[arg(long)]
    pub history_passphrase: Option<String>,

    #[arg(long)]
    pub tls: bool,

    #[arg(long)]
    pub tls_insecure: bool,

    #[arg(long)]
    pub ca_file: Option<PathBuf>,
}

/// Fully resolved client configuration.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub room: String,
    pub token: Option<String>,
    pub renderer: String,
    pub buffer_size: i64,
    pub quiet_reconnect: bool,
    pub history_file: Option<PathBuf>,
    pub history_passphrase: Option<String>,
    pub tls: bool,
    pub tls_insecure: bool,
    pub ca_file: Option<PathBuf>,
}

impl Config {
    /// Parses argv and validates the flag combination the original also
    /// enforces at the CLI boundary: a history file requires a passphrase.
    pub fn resolve() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        if cli.history_file.is_some() && cli.history_passphrase.is_none() {
            anyhow::bail!("--history-file requires --history-passphrase");
        }
        Ok(Self {
            host: cli.host,
            port: cli.port,
            name: cli.name,
            room: cli.room,
            token: cli.token,
            renderer: cli.renderer,
            buffer_size: cli.buffer_size.clamp(10, 1000),
            quiet_reconnect: cli.quiet_reconnect,
            history_file: cli.history_file,
            history_passphrase: cli.history_passphrase,
            tls: cli.tls,
            tls_insecure: cli.tls_insecure,
            ca_file: cli.ca_file,
        })
    }
}
