//! Switch-room handler (§4.9). Grounded on the original's
//! `server/handlers/system.py::handle_switch_room` for the exact four-step
//! ordering (leave-announce, move, private joined-confirmation, join-announce).

use std::sync::Arc;

use cmdchat_core::message::system_payload;
use cmdchat_core::sanitize::sanitize_room;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast::{self, send_to};
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;

pub async fn handle_switch_room(session: &Arc<Session>, registry: &Arc<Registry>, candidate: &str) {
    let new_room = sanitize_room(candidate);
    let old_room = session.room();
    if new_room.is_empty() || new_room == old_room {
        return;
    }

    let name = session.name();

    let left_message = format!("{name} left the room.");
    let left_payload = system_payload(&left_message, session.client_id, &old_room, &utc_timestamp());
    broadcast::broadcast(registry, &left_payload, &old_room, Some(session.client_id)).await;

    registry.move_session(session, new_room.clone());

    let joined_private = format!("Joined room {new_room}.");
    let joined_payload = system_payload(&joined_private, session.client_id, &new_room, &utc_timestamp());
    let _ = send_to(session, &joined_payload).await;

    let joined_message = format!("{name} joined the room.");
    let joined_broadcast = system_payload(&joined_message, session.client_id, &new_room, &utc_timestamp());
    broadcast::broadcast(registry, &joined_broadcast, &new_room, Some(session.client_id)).await;
}
