//! Message schema: the handshake envelope, the encrypted envelope, and the
//! tagged variants carried inside it once decrypted.
//!
//! Server-authored payloads (chat/system/ping/file_init/file_chunk) are built
//! as [`serde_json::Value`] objects with a fixed key order via the
//! constructor functions below, matching the wire contract byte-for-byte.
//! Client-authored payloads are decoded into [`Payload`], a `serde`
//! tagged-variant enum keyed on `type` — unknown or missing fields for a
//! chosen variant fail to deserialize, which the dispatcher treats as a
//! protocol error.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A client's handshake hello, read as the one cleartext frame per connection.
#[derive(Debug, Clone, Deserialize)]
pub struct Handshake {
    #[serde(rename = "type")]
    pub kind: String,
    pub public_key: String,
    pub name: String,
    pub room: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub renderer: Option<String>,
    #[serde(default)]
    pub buffer_size: Option<i64>,
}

/// The server's successful handshake reply.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeOk {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub client_id: u64,
    pub room: String,
    pub renderer: String,
    pub buffer_size: i64,
    pub heartbeat_interval: u64,
    pub nonce_size: usize,
    pub encrypted_key: String,
}

/// The encrypted envelope wrapping every post-handshake frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// A decoded inner payload, tagged on `type`. This is the client-authored
/// (or client-echoed) side of the protocol; server-authored broadcasts are
/// constructed directly as JSON via the functions below rather than through
/// this enum, since the server never needs to parse its own output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Chat { message: Value },
    System { message: Value },
    Rename { name: String },
    SwitchRoom { room: String },
    Ping,
    Pong,
    FileInit {
        file_id: String,
        filename: String,
        filesize: i64,
        total_chunks: i64,
    },
    FileChunk {
        file_id: String,
        chunk_index: i64,
        chunk_data: String,
        is_final: bool,
    },
}

/// Coerces a `chat`/`system` payload's `message` field to a string the way
/// the original's `str(...)` does: a JSON string passes through verbatim,
/// anything else (number, bool, null, array, object) renders as its JSON
/// text (e.g. `123` becomes `"123"`).
pub fn coerce_message_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a server-authored `chat` payload. Key order matches the spec.
pub fn chat_payload(
    sender: &str,
    message: &str,
    client_id: u64,
    room: &str,
    timestamp: &str,
    sequence: u64,
) -> Value {
    json!({
        "type": "chat",
        "sender": sender,
        "message": message,
        "client_id": client_id,
        "room": room,
        "timestamp": timestamp,
        "sequence": sequence,
    })
}

/// Builds a server-authored `system` payload. `client_id` names the subject
/// of the message, not its recipient.
pub fn system_payload(message: &str, client_id: u64, room: &str, timestamp: &str) -> Value {
    json!({
        "type": "system",
        "message": message,
        "client_id": client_id,
        "room": room,
        "timestamp": timestamp,
    })
}

/// Builds the server-driven heartbeat `ping` payload.
pub fn ping_payload(timestamp: &str) -> Value {
    json!({
        "type": "ping",
        "timestamp": timestamp,
    })
}

/// Builds a server-authored `file_init` rebroadcast.
#[allow(clippy::too_many_arguments)]
pub fn file_init_payload(
    sender: &str,
    file_id: &str,
    filename: &str,
    filesize: i64,
    total_chunks: i64,
    client_id: u64,
    room: &str,
    timestamp: &str,
) -> Value {
    json!({
        "type": "file_init",
        "sender": sender,
        "file_id": file_id,
        "filename": filename,
        "filesize": filesize,
        "total_chunks": total_chunks,
        "client_id": client_id,
        "room": room,
        "timestamp": timestamp,
    })
}

/// Builds a server-authored `file_chunk` rebroadcast.
#[allow(clippy::too_many_arguments)]
pub fn file_chunk_payload(
    sender: &str,
    file_id: &str,
    chunk_index: i64,
    chunk_data: &str,
    is_final: bool,
    client_id: u64,
    room: &str,
    timestamp: &str,
) -> Value {
    json!({
        "type": "file_chunk",
        "sender": sender,
        "file_id": file_id,
        "chunk_index": chunk_index,
        "chunk_data": chunk_data,
        "is_final": is_final,
        "client_id": client_id,
        "room": room,
        "timestamp": timestamp,
    })
}

/// Builds the client-authored `{type:"chat", message}` outgoing frame.
pub fn client_chat_payload(message: &str) -> Value {
    json!({"type": "chat", "message": message})
}

/// Builds the client-authored `{type:"pong"}` reply to a heartbeat ping.
pub fn pong_payload() -> Value {
    json!({"type": "pong"})
}

/// Builds the client-authored `{type:"rename", name}` outgoing frame.
pub fn rename_payload(name: &str) -> Value {
    json!({"type": "rename", "name": name})
}

/// Builds the client-authored `{type:"switch_room", room}` outgoing frame.
pub fn switch_room_payload(room: &str) -> Value {
    json!({"type": "switch_room", "room": room})
}

/// Builds the client-authored `file_init` outgoing frame announcing a new
/// upload. No `sender` field — the server fills that in from the session.
pub fn client_file_init_payload(file_id: &str, filename: &str, filesize: i64, total_chunks: i64) -> Value {
    json!({
        "type": "file_init",
        "file_id": file_id,
        "filename": filename,
        "filesize": filesize,
        "total_chunks": total_chunks,
    })
}

/// Builds the client-authored `file_chunk` outgoing frame. `chunk_data` is
/// already base64-encoded by the caller.
pub fn client_file_chunk_payload(file_id: &str, chunk_index: i64, chunk_data: &str, is_final: bool) -> Value {
    json!({
        "type": "file_chunk",
        "file_id": file_id,
        "chunk_index": chunk_index,
        "chunk_data": chunk_data,
        "is_final": is_final,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_payload_has_fixed_keys_in_order() {
        let v = chat_payload("Alice", "hi", 1, "lobby", "2026-01-01T00:00:00Z", 1);
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["type", "sender", "message", "client_id", "room", "timestamp", "sequence"]
        );
    }

    #[test]
    fn payload_chat_roundtrips_through_serde() {
        let decoded: Payload =
            serde_json::from_value(json!({"type": "chat", "message": "hi"})).unwrap();
        match decoded {
            Payload::Chat { message } => assert_eq!(message, "hi"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn payload_unknown_type_fails_to_decode() {
        let err = serde_json::from_value::<Payload>(json!({"type": "teleport"}));
        assert!(err.is_err());
    }

    #[test]
    fn payload_missing_required_field_fails_to_decode() {
        let err = serde_json::from_value::<Payload>(json!({"type": "rename"}));
        assert!(err.is_err());
    }

    #[test]
    fn handshake_tolerates_absent_optional_fields() {
        let hs: Handshake = serde_json::from_value(json!({
            "type": "handshake",
            "public_key": "PEM",
            "name": "Alice",
            "room": "lobby",
        }))
        .unwrap();
        assert_eq!(hs.token, None);
        assert_eq!(hs.renderer, None);
        assert_eq!(hs.buffer_size, None);
    }
}
