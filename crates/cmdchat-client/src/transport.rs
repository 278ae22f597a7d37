//! Client transport core (component §4.14): handshake, concurrent
//! send/receive loops, and the reconnect supervisor.
//!
//! Grounded on the original's `client/core.py::CmdChatClient` for the
//! overall shape (`run` owns the reconnect backoff; `_connect_and_run` owns
//! one connection's lifetime; `send_loop`/`receive_loop` from
//! `client/loops.py` are the two concurrent tasks, raced and cancelled the
//! same way `cmdchatd::acceptor` races its heartbeat/dispatch pair) and on
//! `client/io.py` for the handshake wire exchange and `perform_handshake`'s
//! single-`RuntimeError` failure contract (reproduced here as `ClientError`).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmdchat_core::crypto::{AeadCipher, RsaKeyPair, AES_KEY_SIZE};
use cmdchat_core::framing::{read_frame, write_frame};
use cmdchat_core::message::{
    client_chat_payload, client_file_chunk_payload, client_file_init_payload, pong_payload, rename_payload,
    switch_room_payload,
};
use cmdchat_core::sanitize::{sanitize_name, sanitize_room};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

use crate::commands::{self, Command};
use crate::config::Config;
use crate::error::ClientError;
use crate::file_transfer::{FileTransferManager, FILE_CHUNK_SIZE};
use crate::history::EncryptedHistory;
use crate::renderer::{self, Renderer};
use crate::tls::{self, BoxedStream};

const MIN_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;

/// The `handshake_ok` fields the client acts on. `HandshakeOk` in
/// `cmdchat_core::message` only derives `Serialize` (the server never needs
/// to parse its own reply), so the client decodes the frame by hand instead.
struct HandshakeOkResponse {
    client_id: u64,
    room: String,
    renderer: String,
    buffer_size: i64,
}

/// Runs the client until the user quits, reconnecting with exponential
/// backoff on any connection loss. State (name, room, renderer, history,
/// in-flight file transfers) is created once and survives every reconnect.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AsyncMutex::new(ClientState::new(&config)));
    let mut backoff = MIN_BACKOFF_SECS;

    loop {
        match connect_and_run(&config, state.clone()).await {
            Ok(ClientExit::UserQuit) => break,
            Ok(ClientExit::ConnectionLost(reason)) => {
                // A prior handshake succeeded, so the next attempt starts
                // the backoff fresh rather than continuing to escalate it.
                backoff = MIN_BACKOFF_SECS;
                println!("{}", renderer::reconnect_notice(config.quiet_reconnect, &reason, backoff));
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
            }
            Err(e) => {
                // Never got past connecting or the handshake itself —
                // escalate, since retrying immediately just hammers a
                // server (or network) that is still down.
                println!("{}", renderer::reconnect_notice(config.quiet_reconnect, &e.to_string(), backoff));
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
            }
        }
    }

    println!("Client session terminated.");
    Ok(())
}

enum ClientExit {
    UserQuit,
    ConnectionLost(String),
}

/// State retained across reconnects: the optimistic name/room, renderer,
/// history, and file transfer manager. Shared between the send and receive
/// tasks behind one lock since both observe or mutate it.
struct ClientState {
    name: String,
    room: String,
    renderer_name: String,
    renderer: Box<dyn Renderer>,
    history: Option<EncryptedHistory>,
    file_manager: FileTransferManager,
    downloads_dir: PathBuf,
    /// The pending output buffer (`client/core.py`'s `self._messages`): a
    /// bounded scrollback of recent payloads, capped at the
    /// server-negotiated `buffer_size` and re-capped (truncating to the most
    /// recent entries) on every reconnect. Survives reconnects; cleared by
    /// `/clear`.
    output_buffer: VecDeque<Value>,
    buffer_cap: usize,
}

impl ClientState {
    fn new(config: &Config) -> Self {
        let history = match (&config.history_file, &config.history_passphrase) {
            (Some(path), Some(passphrase)) => Some(EncryptedHistory::open(path.clone(), passphrase.clone())),
            _ => None,
        };
        Self {
            name: sanitize_name(&config.name),
            room: sanitize_room(&config.room),
            renderer_name: config.renderer.clone(),
            renderer: renderer::create_renderer(&config.renderer),
            history,
            file_manager: FileTransferManager::new(),
            downloads_dir: std::env::current_dir().unwrap_or_default().join("downloads"),
            output_buffer: VecDeque::new(),
            buffer_cap: config.buffer_size.clamp(10, 1000) as usize,
        }
    }

    /// Renders, logs, and (if enabled) persists one incoming payload, and
    /// appends it to the capped output buffer.
    fn record(&mut self, payload: Value) {
        println!("{}", self.renderer.render(&payload));
        if let Some(history) = &mut self.history {
            if let Err(e) = history.append(payload.clone()) {
                tracing::warn!(error = %e, "failed to persist history entry");
            }
        }
        self.output_buffer.push_back(payload);
        while self.output_buffer.len() > self.buffer_cap {
            self.output_buffer.pop_front();
        }
    }

    /// Re-caps the output buffer to a newly negotiated size, truncating to
    /// the most recent entries the way `client/core.py::_connect_and_run`
    /// rebuilds `self._messages` on every reconnect.
    fn recap_output_buffer(&mut self, negotiated_size: i64) {
        self.buffer_cap = negotiated_size.clamp(10, 1000) as usize;
        while self.output_buffer.len() > self.buffer_cap {
            self.output_buffer.pop_front();
        }
    }
}

async fn connect_and_run(config: &Config, state: Arc<AsyncMutex<ClientState>>) -> anyhow::Result<ClientExit> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(ClientError::Connect)?;
    let connector = tls::build_connector(config.tls, config.tls_insecure, config.ca_file.as_deref())?;
    let stream = tls::maybe_wrap(tcp, connector.as_ref(), &config.host).await?;

    let (name, room) = {
        let guard = state.lock().await;
        (guard.name.clone(), guard.room.clone())
    };

    let (cipher, response, read_half, write_half) = perform_handshake(stream, config, &name, &room).await?;

    {
        let mut guard = state.lock().await;
        guard.room = response.room.clone();
        if response.renderer != guard.renderer_name {
            guard.renderer_name = response.renderer.clone();
            guard.renderer = renderer::create_renderer(&response.renderer);
        }
        guard.recap_output_buffer(response.buffer_size);
    }

    println!(
        "Connected to cmdchat as {} in room {} (client_id {}).",
        name, response.room, response.client_id
    );
    println!("{}", commands::HELP_TEXT);

    let cipher = Arc::new(cipher);
    let write_half = Arc::new(AsyncMutex::new(write_half));

    let send_task = tokio::spawn(send_loop(write_half.clone(), cipher.clone(), state.clone()));
    let recv_task = tokio::spawn(receive_loop(read_half, cipher.clone(), write_half.clone(), state.clone()));

    let exit = tokio::select! {
        result = send_task => {
            recv_task.abort();
            match result {
                Ok(SendOutcome::Quit) => ClientExit::UserQuit,
                Ok(SendOutcome::Error(e)) => ClientExit::ConnectionLost(e.to_string()),
                Err(_join_error) => ClientExit::ConnectionLost("send task panicked".to_string()),
            }
        }
        result = recv_task => {
            send_task.abort();
            match result {
                Ok(error) => ClientExit::ConnectionLost(error.to_string()),
                Err(_join_error) => ClientExit::ConnectionLost("receive task panicked".to_string()),
            }
        }
    };

    let mut sink = write_half.lock().await;
    let _ = sink.shutdown().await;
    Ok(exit)
}

async fn perform_handshake(
    stream: BoxedStream,
    config: &Config,
    name: &str,
    room: &str,
) -> Result<(AeadCipher, HandshakeOkResponse, ReadHalf<BoxedStream>, WriteHalf<BoxedStream>), ClientError> {
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let keypair = RsaKeyPair::generate()?;
    let public_key_pem = keypair.public_to_pem()?;

    let mut hello = serde_json::json!({
        "type": "handshake",
        "public_key": public_key_pem,
        "name": name,
        "room": room,
        "renderer": config.renderer,
        "buffer_size": config.buffer_size,
    });
    if let Some(token) = &config.token {
        hello["token"] = Value::String(token.clone());
    }
    write_frame(&mut write_half, &hello).await?;

    let reply = read_frame(&mut read_half).await?;
    match reply.get("type").and_then(Value::as_str) {
        Some("handshake_error") => {
            let reason = reply
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Err(ClientError::HandshakeRejected { reason })
        }
        Some("handshake_ok") => {
            let client_id = reply
                .get("client_id")
                .and_then(Value::as_u64)
                .ok_or(ClientError::UnexpectedHandshakeResponse)?;
            let room = reply
                .get("room")
                .and_then(Value::as_str)
                .ok_or(ClientError::UnexpectedHandshakeResponse)?
                .to_string();
            let renderer = reply
                .get("renderer")
                .and_then(Value::as_str)
                .unwrap_or("rich")
                .to_string();
            let buffer_size = reply.get("buffer_size").and_then(Value::as_i64).unwrap_or(200);

            let encrypted_key_b64 = reply
                .get("encrypted_key")
                .and_then(Value::as_str)
                .ok_or(ClientError::MissingEncryptedKey)?;
            let wrapped = BASE64
                .decode(encrypted_key_b64)
                .map_err(|_| ClientError::MissingEncryptedKey)?;
            let session_key = keypair.decrypt(&wrapped)?;
            if session_key.len() != AES_KEY_SIZE {
                return Err(ClientError::MissingEncryptedKey);
            }
            let mut key_bytes = [0u8; AES_KEY_SIZE];
            key_bytes.copy_from_slice(&session_key);
            let cipher = AeadCipher::from_bytes(key_bytes);

            Ok((
                cipher,
                HandshakeOkResponse {
                    client_id,
                    room,
                    renderer,
                    buffer_size,
                },
                read_half,
                write_half,
            ))
        }
        _ => Err(ClientError::UnexpectedHandshakeResponse),
    }
}

async fn send_encrypted(
    write_half: &Arc<AsyncMutex<WriteHalf<BoxedStream>>>,
    cipher: &AeadCipher,
    payload: &Value,
) -> Result<(), ClientError> {
    let plaintext = serde_json::to_vec(payload).expect("payload always serializes");
    let (nonce, ciphertext) = cipher.encrypt(&plaintext)?;
    let envelope = serde_json::json!({
        "type": "encrypted",
        "nonce": BASE64.encode(nonce),
        "ciphertext": BASE64.encode(ciphertext),
    });
    let mut sink = write_half.lock().await;
    write_frame(&mut *sink, &envelope).await?;
    Ok(())
}

enum SendOutcome {
    Quit,
    Error(ClientError),
}

/// Reads stdin line by line, dispatching `/`-prefixed lines to
/// [`commands::parse`] and everything else as a chat message. Grounded on
/// `client/loops.py::send_loop` and `client/core.py::_handle_command`'s
/// optimistic local update for `/nick` and `/join`.
async fn send_loop(
    write_half: Arc<AsyncMutex<WriteHalf<BoxedStream>>>,
    cipher: Arc<AeadCipher>,
    state: Arc<AsyncMutex<ClientState>>,
) -> SendOutcome {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return SendOutcome::Quit,
            Err(e) => return SendOutcome::Error(ClientError::Connect(e)),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('/') {
            match commands::parse(trimmed) {
                Command::Quit => return SendOutcome::Quit,
                Command::Help => println!("{}", commands::HELP_TEXT),
                Command::Clear => {
                    print!("\x1B[2J\x1B[1;1H");
                    state.lock().await.output_buffer.clear();
                }
                Command::Nick { name } => {
                    let sanitized = sanitize_name(&name);
                    state.lock().await.name = sanitized.clone();
                    if let Err(e) = send_encrypted(&write_half, &cipher, &rename_payload(&sanitized)).await {
                        return SendOutcome::Error(e);
                    }
                }
                Command::Join { room } => {
                    let sanitized = sanitize_room(&room);
                    state.lock().await.room = sanitized.clone();
                    if let Err(e) = send_encrypted(&write_half, &cipher, &switch_room_payload(&sanitized)).await {
                        return SendOutcome::Error(e);
                    }
                }
                Command::Send { filepath } => {
                    if let Err(e) = send_file(&write_half, &cipher, &state, &filepath).await {
                        println!("[status] file transfer failed: {e}");
                    }
                }
                Command::Unknown { command } => println!("[status] unrecognized command: {command}"),
            }
        } else if let Err(e) = send_encrypted(&write_half, &cipher, &client_chat_payload(trimmed)).await {
            return SendOutcome::Error(e);
        }
    }
}

/// Grounded on `lib/file_transfer.py`'s outgoing side: announce with
/// `file_init`, then stream fixed-size `file_chunk`s with the last one
/// flagged `is_final`.
async fn send_file(
    write_half: &Arc<AsyncMutex<WriteHalf<BoxedStream>>>,
    cipher: &Arc<AeadCipher>,
    state: &Arc<AsyncMutex<ClientState>>,
    filepath: &str,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(filepath)?;
    let filename = std::path::Path::new(filepath)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();

    let sender_name = state.lock().await.name.clone();
    let file_id = FileTransferManager::generate_file_id(&sender_name, &filename);
    let total_chunks = FileTransferManager::calculate_chunks(bytes.len() as i64, FILE_CHUNK_SIZE);

    send_encrypted(
        write_half,
        cipher,
        &client_file_init_payload(&file_id, &filename, bytes.len() as i64, total_chunks),
    )
    .await?;

    for (index, chunk) in bytes.chunks(FILE_CHUNK_SIZE).enumerate() {
        let is_final = (index as i64 + 1) == total_chunks;
        let encoded = BASE64.encode(chunk);
        send_encrypted(
            write_half,
            cipher,
            &client_file_chunk_payload(&file_id, index as i64, &encoded, is_final),
        )
        .await?;
    }

    println!("[status] sent {filename} ({total_chunks} chunks).");
    Ok(())
}

/// Reads decrypted server frames and routes them to rendering, history, or
/// the file transfer manager. Grounded on `client/loops.py::receive_loop`:
/// a non-`encrypted` frame, an undecodable envelope, or a decrypt failure
/// are all **non-fatal** here (unlike the server's equivalent policy, §7) —
/// each logs a status line and continues reading the next frame instead of
/// tearing the connection down.
async fn receive_loop(
    mut read_half: ReadHalf<BoxedStream>,
    cipher: Arc<AeadCipher>,
    write_half: Arc<AsyncMutex<WriteHalf<BoxedStream>>>,
    state: Arc<AsyncMutex<ClientState>>,
) -> ClientError {
    loop {
        let frame = match read_frame(&mut read_half).await {
            Ok(v) => v,
            Err(e) => return ClientError::Framing(e),
        };

        if frame.get("type").and_then(Value::as_str) != Some("encrypted") {
            println!("[status] Received unexpected message from server.");
            continue;
        }

        let decoded = frame
            .get("nonce")
            .and_then(Value::as_str)
            .zip(frame.get("ciphertext").and_then(Value::as_str))
            .and_then(|(nonce, ciphertext)| Some((BASE64.decode(nonce).ok()?, BASE64.decode(ciphertext).ok()?)));
        let (nonce, ciphertext) = match decoded {
            Some(pair) => pair,
            None => {
                println!("[status] Malformed encrypted message.");
                continue;
            }
        };

        let plaintext = match cipher.decrypt(&nonce, &ciphertext) {
            Ok(p) => p,
            Err(e) => {
                println!("[status] Failed to decrypt message: {e}");
                continue;
            }
        };
        let payload: Value = match serde_json::from_slice(&plaintext) {
            Ok(v) => v,
            Err(_) => {
                println!("[status] Malformed encrypted message.");
                continue;
            }
        };

        match payload.get("type").and_then(Value::as_str) {
            Some("ping") => {
                if let Err(e) = send_encrypted(&write_half, &cipher, &pong_payload()).await {
                    return e;
                }
            }
            Some("file_init") => {
                let file_id = payload.get("file_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let filename = payload
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or("file")
                    .to_string();
                let total_chunks = payload.get("total_chunks").and_then(Value::as_i64).unwrap_or(0);
                let mut guard = state.lock().await;
                guard.file_manager.start_transfer(file_id, filename, total_chunks);
                guard.record(payload);
            }
            Some("file_chunk") => {
                let file_id = payload.get("file_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let chunk_index = payload.get("chunk_index").and_then(Value::as_i64).unwrap_or(0);
                let is_final = payload.get("is_final").and_then(Value::as_bool).unwrap_or(false);
                let Some(chunk_bytes) = payload
                    .get("chunk_data")
                    .and_then(Value::as_str)
                    .and_then(|s| BASE64.decode(s).ok())
                else {
                    println!("[status] Malformed encrypted message.");
                    continue;
                };

                let mut guard = state.lock().await;
                guard.file_manager.add_chunk(&file_id, chunk_index, chunk_bytes);
                if is_final && guard.file_manager.is_complete(&file_id) {
                    let downloads_dir = guard.downloads_dir.clone();
                    match guard.file_manager.complete_transfer(&file_id, &downloads_dir) {
                        Ok(path) => println!("[status] received file saved to {}", path.display()),
                        Err(e) => println!("[status] failed to save received file: {e}"),
                    }
                }
            }
            _ => {
                state.lock().await.record(payload);
            }
        }
    }
}
