//! The `Session` record: one per accepted, handshaken connection.
//!
//! Fields mutated by more than one task use interior mutability: `name` and
//! `room` are a plain `std::sync::RwLock` (no I/O ever happens while held),
//! `sink` is a `tokio::sync::Mutex` because a frame write is awaited while
//! the lock is held, and `last_seen` is a lock-free atomic since the
//! heartbeat supervisor is specified to read it without synchronization
//! (stale reads are acceptable, §4.12 of the spec this crate implements).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use cmdchat_core::crypto::AeadCipher;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex as AsyncMutex;

use crate::rate_limit::RateWindow;

/// A type-erased, write-only byte sink for one session's outbound frames.
pub type Sink = Box<dyn AsyncWrite + Unpin + Send>;

/// One accepted, handshaken connection.
pub struct Session {
    pub client_id: u64,
    name: RwLock<String>,
    room: RwLock<String>,
    pub sink: AsyncMutex<Sink>,
    pub cipher: AeadCipher,
    pub renderer_hint: String,
    pub buffer_size_hint: i64,
    last_seen_millis: AtomicU64,
    epoch: Instant,
    /// Written only by the dispatcher handling this session's own chat
    /// messages; no other task reads it.
    pub rate_window: AsyncMutex<RateWindow>,
}

impl Session {
    pub fn new(
        client_id: u64,
        name: String,
        room: String,
        sink: Sink,
        cipher: AeadCipher,
        renderer_hint: String,
        buffer_size_hint: i64,
    ) -> Self {
        let epoch = Instant::now();
        Self {
            client_id,
            name: RwLock::new(name),
            room: RwLock::new(room),
            sink: AsyncMutex::new(sink),
            cipher,
            renderer_hint,
            buffer_size_hint,
            last_seen_millis: AtomicU64::new(0),
            epoch,
            rate_window: AsyncMutex::new(RateWindow::new()),
        }
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write().unwrap() = new_name;
    }

    pub fn room(&self) -> String {
        self.room.read().unwrap().clone()
    }

    pub(crate) fn set_room(&self, new_room: String) {
        *self.room.write().unwrap() = new_room;
    }

    /// Refreshes liveness. Called once per decoded frame (§4.6 step 4),
    /// unconditionally — even frames the rate limiter goes on to drop still
    /// refresh liveness (this spec's documented open question: liveness !=
    /// delivery).
    pub fn touch(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_seen_millis.store(elapsed, Ordering::Relaxed);
    }

    /// Seconds since the last touched frame, read lock-free.
    pub fn seconds_since_last_seen(&self) -> f64 {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_seen_millis.load(Ordering::Relaxed);
        elapsed.saturating_sub(last) as f64 / 1000.0
    }
}

/// Renders the current wall-clock time in the shape the wire timestamp fields
/// use. Kept here rather than re-exported from `cmdchat_core::time` so
/// callers in this crate don't need two imports for the same concept.
pub fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdchat_core::crypto::AeadCipher;
    use tokio::io::sink as null_sink;

    fn test_session() -> Session {
        Session::new(
            1,
            "alice".to_string(),
            "lobby".to_string(),
            Box::new(null_sink()),
            AeadCipher::generate(),
            "rich".to_string(),
            200,
        )
    }

    #[test]
    fn name_and_room_mutate_independently() {
        let session = test_session();
        session.set_name("alicia".to_string());
        session.set_room("devs".to_string());
        assert_eq!(session.name(), "alicia");
        assert_eq!(session.room(), "devs");
    }

    #[test]
    fn touch_advances_seconds_since_last_seen_towards_zero() {
        let session = test_session();
        session.touch();
        assert!(session.seconds_since_last_seen() < 1.0);
    }
}
