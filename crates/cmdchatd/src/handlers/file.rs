//! File-init / file-chunk handlers (§4.10). The server forwards only; it
//! never reassembles, verifies chunk order, or tracks per-transfer state —
//! see SPEC_FULL.md's Open Question on this. Grounded on the original's
//! `server/handlers/files.py`, with the stricter `total_chunks >= 1`
//! validation this spec adds over the original (DESIGN.md Open Question #3).

use std::sync::Arc;

use cmdchat_core::message::{file_chunk_payload, file_init_payload, system_payload};
use cmdchat_core::sanitize::sanitize_filename;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast::{self, send_to};
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;

/// 10 MiB, the largest file this broker will forward.
pub const MAX_FILE_SIZE: i64 = 10 * 1024 * 1024;

pub async fn handle_file_init(
    session: &Arc<Session>,
    registry: &Arc<Registry>,
    file_id: &str,
    filename: &str,
    filesize: i64,
    total_chunks: i64,
) {
    if file_id.is_empty() || filesize <= 0 || filesize > MAX_FILE_SIZE || total_chunks < 1 {
        let mb = MAX_FILE_SIZE / (1024 * 1024);
        let warning = system_payload(
            &format!("File transfer rejected: invalid size (max {mb}MB)."),
            session.client_id,
            &session.room(),
            &utc_timestamp(),
        );
        let _ = send_to(session, &warning).await;
        return;
    }

    let filename = sanitize_filename(filename);
    let room = session.room();
    let payload = file_init_payload(
        &session.name(),
        file_id,
        &filename,
        filesize,
        total_chunks,
        session.client_id,
        &room,
        &utc_timestamp(),
    );
    broadcast::broadcast(registry, &payload, &room, None).await;
}

pub async fn handle_file_chunk(
    session: &Arc<Session>,
    registry: &Arc<Registry>,
    file_id: &str,
    chunk_index: i64,
    chunk_data: &str,
    is_final: bool,
) {
    if file_id.is_empty() {
        return;
    }

    let room = session.room();
    let name = session.name();
    let payload = file_chunk_payload(
        &name,
        file_id,
        chunk_index,
        chunk_data,
        is_final,
        session.client_id,
        &room,
        &utc_timestamp(),
    );
    broadcast::broadcast(registry, &payload, &room, Some(session.client_id)).await;

    if is_final {
        let message = format!("{name} completed file transfer.");
        let completion = system_payload(&message, session.client_id, &room, &utc_timestamp());
        broadcast::broadcast(registry, &completion, &room, None).await;
    }
}
