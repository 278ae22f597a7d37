//! Rename handler (§4.8). Grounded on the original's
//! `server/handlers/system.py::handle_rename`.

use std::sync::Arc;

use cmdchat_core::message::system_payload;
use cmdchat_core::sanitize::sanitize_name;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast;
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;

pub async fn handle_rename(session: &Arc<Session>, registry: &Arc<Registry>, candidate: &str) {
    let new_name = sanitize_name(candidate);
    let old_name = session.name();
    if new_name.is_empty() || new_name == old_name {
        return;
    }

    session.set_name(new_name.clone());

    let message = format!("{old_name} is now known as {new_name}.");
    let payload = system_payload(&message, session.client_id, &session.room(), &utc_timestamp());
    broadcast::broadcast(registry, &payload, &session.room(), None).await;
}
