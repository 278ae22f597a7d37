//! Heartbeat supervisor (component I, §4.12): one task per session, ticking
//! a server-driven `ping` and evicting sessions that go quiet for too long.
//!
//! Grounded on the original's `server/heartbeat.py`, which runs the same
//! ping/timeout loop per connected socket from a shared asyncio task pool;
//! here each session gets its own tokio task instead; the constants and the
//! "evict by closing the sink, let the dispatcher notice" approach are the
//! same.

use std::sync::Arc;
use std::time::Duration;

use cmdchat_services::broadcast::send_to;
use cmdchat_services::session::Session;
use tokio::io::AsyncWriteExt;

use crate::dispatch::heartbeat_ping_payload;

/// Interval between server-driven pings.
pub const HEARTBEAT_INTERVAL_SECS: u64 = crate::handshake::HEARTBEAT_INTERVAL_SECS;
/// A session silent for longer than this is evicted.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 45;

/// Runs until the session has gone silent for [`HEARTBEAT_TIMEOUT_SECS`] or a
/// ping write fails, then closes the sink so the dispatcher's next read
/// observes EOF and tears the connection down through the normal path.
pub async fn supervise(session: Arc<Session>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    loop {
        ticker.tick().await;

        if session.seconds_since_last_seen() as u64 >= HEARTBEAT_TIMEOUT_SECS {
            tracing::warn!(client_id = session.client_id, "heartbeat timeout, evicting session");
            let mut sink = session.sink.lock().await;
            let _ = sink.shutdown().await;
            return;
        }

        let ping = heartbeat_ping_payload();
        if send_to(&session, &ping).await.is_err() {
            return;
        }
    }
}
