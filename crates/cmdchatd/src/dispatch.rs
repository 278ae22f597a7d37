//! The post-handshake dispatcher loop (component F, §4.6): decode one
//! encrypted frame, refresh liveness, route to a handler, repeat until a
//! fatal condition ends the connection.
//!
//! Grounded on the original's `server/io.py::handle_client`'s main loop shape
//! (read → decrypt → dispatch) and on its `dispatch.py` table of payload
//! types, generalized to this daemon's typed `Payload` enum instead of a
//! string-keyed dict.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmdchat_core::framing::read_frame;
use cmdchat_core::message::{coerce_message_to_string, ping_payload, pong_payload, Payload};
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast::send_to;
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;
use tokio::io::{AsyncRead, ReadHalf};

use crate::error::ProtocolError;
use crate::handlers::{
    handle_chat, handle_file_chunk, handle_file_init, handle_rename, handle_switch_room, handle_system,
};
use crate::metrics::Metrics;

/// Runs the dispatch loop until a fatal [`ProtocolError`] ends the
/// connection. The caller (the acceptor) is responsible for the teardown
/// broadcast; this function only ever returns, never broadcasts on exit
/// itself.
pub async fn run<S>(
    mut read_half: ReadHalf<S>,
    session: Arc<Session>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
) -> ProtocolError
where
    S: AsyncRead + Unpin + Send,
{
    loop {
        let frame = match read_frame(&mut read_half).await {
            Ok(value) => value,
            Err(e) => return ProtocolError::Framing(e),
        };

        if frame.get("type").and_then(|v| v.as_str()) != Some("encrypted") {
            return ProtocolError::UnexpectedCleartext;
        }

        let nonce_b64 = match frame.get("nonce").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return ProtocolError::DecryptFailure,
        };
        let ciphertext_b64 = match frame.get("ciphertext").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return ProtocolError::DecryptFailure,
        };
        let nonce = match BASE64.decode(nonce_b64) {
            Ok(b) => b,
            Err(_) => return ProtocolError::DecryptFailure,
        };
        let ciphertext = match BASE64.decode(ciphertext_b64) {
            Ok(b) => b,
            Err(_) => return ProtocolError::DecryptFailure,
        };
        let plaintext = match session.cipher.decrypt(&nonce, &ciphertext) {
            Ok(p) => p,
            Err(_) => return ProtocolError::DecryptFailure,
        };
        let payload: Payload = match serde_json::from_slice(&plaintext) {
            Ok(p) => p,
            Err(_) => return ProtocolError::UnknownPayloadType,
        };

        // Liveness refreshes unconditionally, before any rate-limit check —
        // a throttled sender is still a live one.
        session.touch();

        match payload {
            Payload::Chat { message } => {
                let text = coerce_message_to_string(&message);
                handle_chat(&session, &registry, &metrics, &text).await;
            }
            Payload::System { message } => {
                let text = coerce_message_to_string(&message);
                handle_system(&session, &registry, &text).await;
            }
            Payload::Rename { name } => handle_rename(&session, &registry, &name).await,
            Payload::SwitchRoom { room } => handle_switch_room(&session, &registry, &room).await,
            Payload::Ping => {
                let pong = pong_payload();
                if let Err(e) = send_to(&session, &pong).await {
                    return ProtocolError::Write(e);
                }
            }
            Payload::Pong => {
                // The heartbeat supervisor reads `session.touch()` timestamps
                // directly; no further action is needed here.
            }
            Payload::FileInit {
                file_id,
                filename,
                filesize,
                total_chunks,
            } => {
                handle_file_init(&session, &registry, &file_id, &filename, filesize, total_chunks).await;
            }
            Payload::FileChunk {
                file_id,
                chunk_index,
                chunk_data,
                is_final,
            } => {
                handle_file_chunk(&session, &registry, &file_id, chunk_index, &chunk_data, is_final).await;
            }
        }
    }
}

/// Builds the server-driven heartbeat ping frame's payload, re-exported here
/// so `heartbeat.rs` doesn't need a direct `cmdchat_core::message` import for
/// this one call site.
pub fn heartbeat_ping_payload() -> serde_json::Value {
    ping_payload(&utc_timestamp())
}
