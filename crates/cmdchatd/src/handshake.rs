//! The handshake engine (component E): one cleartext frame in, session-key
//! transport, registry admission.
//!
//! Structurally this plays the role `cmdchatd::session::handshake` plays in
//! the teacher — except that file is dead, fully commented-out code in the
//! teacher (a Noise_XX handshake over UDP that was never finished). Nothing
//! from its body is reused; only the top-level shape ("read hello, validate,
//! reply, admit") and the `anyhow`-free typed-error idiom come from the rest
//! of the daemon. Field semantics and the `reason` strings are grounded on
//! the original implementation's `server/io.py::perform_handshake`.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmdchat_core::crypto::{AeadCipher, RsaKeyPair, AES_NONCE_SIZE};
use cmdchat_core::framing::{read_frame, write_frame};
use cmdchat_core::message::{Handshake, HandshakeOk};
use cmdchat_core::sanitize::{sanitize_buffer_size, sanitize_name, sanitize_renderer, sanitize_room, sanitize_token};
use cmdchat_core::time::utc_timestamp;
use cmdchat_core::message::system_payload;
use cmdchat_services::broadcast;
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use crate::error::HandshakeError;

pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Reads one cleartext hello frame, authenticates it, transports a fresh
/// session key, and admits the new session to `registry`. Returns the
/// admitted session plus the still-owned read half for the dispatcher loop.
pub async fn perform_handshake<S>(
    stream: S,
    registry: &Arc<Registry>,
    tokens: &HashSet<String>,
) -> Result<(Arc<Session>, ReadHalf<S>), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let hello_value = read_frame(&mut read_half).await?;
    if hello_value.get("type").and_then(|v| v.as_str()) != Some("handshake") {
        send_error(&mut write_half, HandshakeError::ExpectedHandshake.reason()).await;
        return Err(HandshakeError::ExpectedHandshake);
    }

    let public_key_pem = match hello_value.get("public_key").and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            send_error(&mut write_half, HandshakeError::MissingPublicKey.reason()).await;
            return Err(HandshakeError::MissingPublicKey);
        }
    };

    let hello: Handshake = serde_json::from_value(hello_value).map_err(|_| HandshakeError::MissingPublicKey)?;

    let token_masked = sanitize_token(hello.token.as_deref());
    if !tokens.is_empty() {
        let authorized = hello
            .token
            .as_deref()
            .map(|t| tokens.contains(t))
            .unwrap_or(false);
        if !authorized {
            tracing::warn!(token = %token_masked, "handshake rejected: unauthorized");
            send_error(&mut write_half, HandshakeError::Unauthorized.reason()).await;
            return Err(HandshakeError::Unauthorized);
        }
    }

    let peer_public_key = RsaKeyPair::public_from_pem(&public_key_pem)
        .map_err(|_| HandshakeError::InvalidPublicKey)?;

    let session_cipher = AeadCipher::generate();
    let wrapped_key = RsaKeyPair::encrypt_for(&peer_public_key, session_cipher.key_bytes())
        .map_err(|_| HandshakeError::InvalidPublicKey)?;

    let client_id = registry.issue_id();
    let name = sanitize_name(&hello.name);
    let room = sanitize_room(&hello.room);
    let renderer = sanitize_renderer(hello.renderer.as_deref().unwrap_or("rich"));
    let buffer_size = sanitize_buffer_size(hello.buffer_size);

    let session = Arc::new(Session::new(
        client_id,
        name.clone(),
        room.clone(),
        Box::new(write_half),
        session_cipher,
        renderer.clone(),
        buffer_size,
    ));
    registry.insert(session.clone());

    let reply = HandshakeOk {
        kind: "handshake_ok",
        client_id,
        room: room.clone(),
        renderer,
        buffer_size,
        heartbeat_interval: HEARTBEAT_INTERVAL_SECS,
        nonce_size: AES_NONCE_SIZE,
        encrypted_key: BASE64.encode(wrapped_key),
    };
    {
        let mut sink = session.sink.lock().await;
        let reply_value = serde_json::to_value(&reply).expect("HandshakeOk always serializes");
        if write_frame(&mut *sink, &reply_value).await.is_err() {
            // The caller's dispatcher will observe the subsequent read/write
            // failing and tear the session down; nothing more to do here.
            tracing::warn!(client_id, "failed to write handshake_ok reply");
        }
    }

    let join_message = format!("{name} joined the chat.");
    let join_payload = system_payload(&join_message, client_id, &room, &utc_timestamp());
    broadcast::broadcast(registry, &join_payload, &room, Some(client_id)).await;

    Ok((session, read_half))
}

async fn send_error<W: AsyncWrite + Unpin>(write_half: &mut W, reason: &str) {
    let value = serde_json::json!({"type": "handshake_error", "reason": reason});
    let _ = write_frame(write_half, &value).await;
}
