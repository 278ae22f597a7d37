//! Connection acceptor (component J): binds the listener, TLS-wraps each
//! accepted socket, and drives one connection end to end — handshake,
//! concurrent dispatch/heartbeat, and unconditional teardown.
//!
//! Grounded on the original's `server/run.py::main`'s accept loop and its
//! `handle_client`'s `try/except/finally` teardown shape: the `finally`
//! block always announces "left the chat"; the `except` block, reached only
//! for an exception the rest of the handler didn't already turn into a
//! typed, expected shutdown, additionally announces "disconnected
//! unexpectedly" first. Here that unexpected path is a panicked dispatch
//! task, observed as a `JoinError` (DESIGN.md Open Question #2).

use std::collections::HashSet;
use std::sync::Arc;

use cmdchat_core::message::system_payload;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast;
use cmdchat_services::registry::Registry;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::dispatch;
use crate::handshake::perform_handshake;
use crate::heartbeat::supervise;
use crate::metrics::Metrics;
use crate::tls;

/// Binds `host:port` and accepts connections until `shutdown` fires.
pub async fn run(
    host: String,
    port: u16,
    tls_acceptor: Option<TlsAcceptor>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    tokens: Arc<HashSet<String>>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                tracing::info!(%peer_addr, "accepted connection");

                let registry = registry.clone();
                let metrics = metrics.clone();
                let tokens = tokens.clone();
                let tls_acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, tls_acceptor, registry, metrics, tokens).await {
                        tracing::warn!(%peer_addr, error = %e, "connection ended with an error before handshake completed");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("acceptor shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    tls_acceptor: Option<TlsAcceptor>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    tokens: Arc<HashSet<String>>,
) -> anyhow::Result<()> {
    let stream = tls::maybe_wrap(stream, tls_acceptor.as_ref()).await?;
    let (session, read_half) = match perform_handshake(stream, &registry, &tokens).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::info!(error = %e, "handshake rejected");
            return Ok(());
        }
    };

    let heartbeat_task = tokio::spawn(supervise(session.clone()));
    let dispatch_task = tokio::spawn(dispatch::run(read_half, session.clone(), registry.clone(), metrics.clone()));

    let unexpected = tokio::select! {
        result = heartbeat_task => {
            dispatch_task.abort();
            let _ = result;
            false
        }
        result = dispatch_task => {
            heartbeat_task.abort();
            match result {
                Ok(protocol_error) => {
                    tracing::info!(client_id = session.client_id, reason = %protocol_error, "dispatch ended");
                    false
                }
                Err(join_error) => {
                    tracing::warn!(client_id = session.client_id, error = %join_error, "dispatch task panicked");
                    true
                }
            }
        }
    };

    registry.remove(session.client_id);

    let room = session.room();
    let name = session.name();

    if unexpected {
        let message = format!("{name} disconnected unexpectedly.");
        let payload = system_payload(&message, session.client_id, &room, &utc_timestamp());
        broadcast::broadcast(&registry, &payload, &room, Some(session.client_id)).await;
    }

    let left_message = format!("{name} left the chat.");
    let left_payload = system_payload(&left_message, session.client_id, &room, &utc_timestamp());
    broadcast::broadcast(&registry, &left_payload, &room, Some(session.client_id)).await;

    let mut sink = session.sink.lock().await;
    let _ = sink.shutdown().await;

    Ok(())
}
