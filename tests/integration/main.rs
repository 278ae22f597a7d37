//! cmdchat integration test harness.
//!
//! Each test spawns a real `cmdchatd` binary on its own loopback port and
//! drives it with a hand-rolled protocol client built directly on
//! `cmdchat-core` (framing, crypto, message types) — real wire traffic, no
//! mocks, in the spirit of the teacher's own integration crate (which
//! spawns the real `summitd` binary rather than linking its internals).
//!
//! Requires the workspace to have been built first:
//!
//!   cargo build --workspace
//!   cargo test --test integration

// Daemon processes are killed via .kill(); .wait() is unnecessary for a test
// harness that's about to exit anyway.
#![allow(clippy::zombie_processes)]

mod protocol;

mod handshake;
mod heartbeat;
mod messaging;
mod rate_limit;
mod rooms;

use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Starting port for spawned daemons; each test claims the next one so
/// parallel test threads never collide on a listener.
static NEXT_PORT: AtomicU16 = AtomicU16::new(15_050);

fn cmdchatd_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target/debug/cmdchatd")
}

fn binary_available() -> bool {
    cmdchatd_path().exists()
}

/// A running `cmdchatd` instance on its own port. Killed on drop so a
/// panicking test doesn't leak the process.
pub struct Daemon {
    child: Child,
    pub port: u16,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

/// Spawns `cmdchatd` bound to a fresh loopback port, optionally with
/// `CMDCHAT_TOKENS` set, and waits for the listener to accept connections.
pub async fn spawn_daemon(tokens: Option<&str>) -> Result<Daemon> {
    if !binary_available() {
        bail!("cmdchatd binary not built — run: cargo build -p cmdchatd");
    }

    let port = NEXT_PORT.fetch_add(1, Ordering::SeqCst);

    let mut cmd = Command::new(cmdchatd_path());
    cmd.args(["--host", "127.0.0.1", "--port"]);
    cmd.arg(port.to_string());
    cmd.args(["--metrics-interval", "0"]);
    cmd.env("CMDCHAT_LOG_LEVEL", "warn");
    if let Some(tokens) = tokens {
        cmd.env("CMDCHAT_TOKENS", tokens);
    } else {
        cmd.env_remove("CMDCHAT_TOKENS");
    }

    let child = cmd.spawn().context("failed to spawn cmdchatd")?;
    let daemon = Daemon { child, port };

    wait_for_port(port, 40).await?;
    Ok(daemon)
}

async fn wait_for_port(port: u16, max_attempts: u32) -> Result<()> {
    for attempt in 1..=max_attempts {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        if attempt < max_attempts {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    bail!("cmdchatd never opened port {port} after {max_attempts} attempts")
}
