//! Chat handler & rate limiting (§4.7). Grounded semantically on the
//! original's `server/handlers/chat.py` for the exact limit constants and
//! warning text.

use std::sync::Arc;
use std::time::Instant;

use cmdchat_core::message::{chat_payload, system_payload};
use cmdchat_core::sanitize::sanitize_message;
use cmdchat_core::time::utc_timestamp;
use cmdchat_services::broadcast::{self, send_to};
use cmdchat_services::registry::Registry;
use cmdchat_services::session::Session;

use crate::metrics::Metrics;

pub async fn handle_chat(
    session: &Arc<Session>,
    registry: &Arc<Registry>,
    metrics: &Arc<Metrics>,
    message: &str,
) {
    let message = sanitize_message(message);

    let allowed = {
        let mut window = session.rate_window.lock().await;
        window.record(Instant::now())
    };

    if !allowed {
        let warning = system_payload(
            "Slow down – message rate limit reached.",
            session.client_id,
            &session.room(),
            &utc_timestamp(),
        );
        let _ = send_to(session, &warning).await;
        return;
    }

    let room = session.room();
    let sequence = registry.next_sequence(&room);
    let payload = chat_payload(
        &session.name(),
        &message,
        session.client_id,
        &room,
        &utc_timestamp(),
        sequence,
    );
    broadcast::broadcast(registry, &payload, &room, None).await;
    metrics.increment_messages();
}
