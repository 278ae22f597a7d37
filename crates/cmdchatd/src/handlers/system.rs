//! System-message handler (§4.6 step 5). Grounded on the original's
//! `server/handlers/system.py::handle_system_message`.

use std::sync::Arc;

use cmdchat_core::message::system_payload;
use cmdchat_core::sanitize::sanitize_message;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast;
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;

pub async fn handle_system(session: &Arc<Session>, registry: &Arc<Registry>, message: &str) {
    let text = sanitize_message(message);

    let room = session.room();
    let payload = system_payload(&text, session.client_id, &room, &utc_timestamp());
    broadcast::broadcast(registry, &payload, &room, None).await;
}
