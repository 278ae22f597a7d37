//! The broadcaster (component H): encrypt-and-send fan-out to room members,
//! with snapshot-then-I/O discipline and reap-after-all-recipients semantics.
//!
//! Grounded on `summit-services::session`'s `DashMap` iteration idiom for the
//! snapshot, and on the original implementation's `server/state.py::broadcast`
//! for the load-bearing ordering rule: stale recipients are collected while
//! iterating but only reaped from the registry after every recipient in the
//! snapshot has been attempted, so one faulty peer early in iteration order
//! can never shadow delivery to the peers after it.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmdchat_core::framing::write_frame;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::registry::Registry;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("encryption failed: {0}")]
    Crypto(#[from] cmdchat_core::crypto::CryptoError),
    #[error("framing/write failed: {0}")]
    Framing(#[from] cmdchat_core::framing::FramingError),
}

/// Encrypts `payload` under `session`'s cipher and writes it as one frame,
/// holding the session's write lock for the duration — the unit the spec
/// calls "one frame's encryption + write" (§5 suspension/blocking points).
pub async fn send_to(session: &Session, payload: &Value) -> Result<(), SendError> {
    let plaintext = serde_json::to_vec(payload).expect("Value always serializes");
    let (nonce, ciphertext) = session.cipher.encrypt(&plaintext)?;
    let envelope = json!({
        "type": "encrypted",
        "nonce": BASE64.encode(nonce),
        "ciphertext": BASE64.encode(ciphertext),
    });
    let mut sink = session.sink.lock().await;
    write_frame(&mut *sink, &envelope).await?;
    Ok(())
}

/// Fans `payload` out to every member of `room`, optionally excluding one
/// `client_id` (typically the sender). Recipients whose write fails are
/// reaped from `registry` only after the full snapshot has been attempted.
pub async fn broadcast(registry: &Registry, payload: &Value, room: &str, exclude: Option<u64>) {
    let members = registry.members_of(room);
    let mut stale: Vec<(u64, Arc<Session>)> = Vec::new();

    for session in members {
        if Some(session.client_id) == exclude {
            continue;
        }
        if let Err(err) = send_to(&session, payload).await {
            tracing::warn!(client_id = session.client_id, error = %err, "broadcast write failed, marking stale");
            stale.push((session.client_id, session));
        }
    }

    for (client_id, session) in stale {
        registry.remove(client_id);
        let mut sink = session.sink.lock().await;
        let _ = sink.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdchat_core::crypto::AeadCipher;
    use cmdchat_core::message::system_payload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWrite, Result as IoResult};

    /// A sink that always fails, to exercise the stale-reaping path without a
    /// real socket.
    struct FailingSink;
    impl AsyncWrite for FailingSink {
        fn poll_write(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<IoResult<usize>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "nope")))
        }
        fn poll_flush(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// A sink that counts how many frames were written to it.
    struct CountingSink(StdArc<AtomicUsize>);
    impl AsyncWrite for CountingSink {
        fn poll_write(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<IoResult<usize>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(self: std::pin::Pin<&mut Self>, _: &mut Context<'_>) -> Poll<IoResult<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn faulty_recipient_is_reaped_but_does_not_block_others() {
        let registry = Registry::new();

        let good_counter = StdArc::new(AtomicUsize::new(0));
        let bad_id = registry.issue_id();
        let bad = StdArc::new(Session::new(
            bad_id,
            "bad".into(),
            "lobby".into(),
            Box::new(FailingSink),
            AeadCipher::generate(),
            "rich".into(),
            200,
        ));
        let good_id = registry.issue_id();
        let good = StdArc::new(Session::new(
            good_id,
            "good".into(),
            "lobby".into(),
            Box::new(CountingSink(good_counter.clone())),
            AeadCipher::generate(),
            "rich".into(),
            200,
        ));
        registry.insert(bad);
        registry.insert(good);

        let payload = system_payload("hello", 0, "lobby", "2026-01-01T00:00:00.000Z");
        broadcast(&registry, &payload, "lobby", None).await;

        assert!(good_counter.load(Ordering::SeqCst) > 0);
        assert!(registry.lookup(bad_id).is_none());
        assert!(registry.lookup(good_id).is_some());
    }

    #[tokio::test]
    async fn excluded_session_never_receives_the_broadcast() {
        let registry = Registry::new();
        let excluded_counter = StdArc::new(AtomicUsize::new(0));
        let excluded_id = registry.issue_id();
        let excluded = StdArc::new(Session::new(
            excluded_id,
            "alice".into(),
            "lobby".into(),
            Box::new(CountingSink(excluded_counter.clone())),
            AeadCipher::generate(),
            "rich".into(),
            200,
        ));
        registry.insert(excluded);

        let payload = system_payload("hi", 0, "lobby", "2026-01-01T00:00:00.000Z");
        broadcast(&registry, &payload, "lobby", Some(excluded_id)).await;

        assert_eq!(excluded_counter.load(Ordering::SeqCst), 0);
    }
}
