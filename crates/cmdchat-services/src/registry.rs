//! The process-wide session/room registry (component C).
//!
//! Grounded on `summit-services::session`/`summit-services::peer`'s
//! `DashMap`-keyed shared-table idiom: each field is independently
//! lock-free, and every operation below is a handful of map lookups with no
//! `.await` inside — satisfying "bounded hold, never I/O" without a single
//! coarse mutex. `sequence_per_room` is consolidated here alongside
//! `sessions`/`rooms`/`next_id` rather than living in a second locked
//! structure, a deliberate simplification over the two-lock split in the
//! system this crate's protocol was distilled from (see DESIGN.md).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::session::Session;

/// `Arc<Registry>` is the shared handle every connection task holds a clone
/// of; cloning the `Arc` is the intended way to share it, mirroring
/// `summit-services`'s `Arc<DashMap<...>>` type aliases.
pub struct Registry {
    sessions: DashMap<u64, Arc<Session>>,
    rooms: DashMap<String, DashSet<u64>>,
    next_id: AtomicU64,
    sequence_per_room: DashMap<String, AtomicU64>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            sequence_per_room: DashMap::new(),
        })
    }

    /// Returns a fresh, never-reused `client_id`.
    pub fn issue_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Admits `session` into both `sessions` and `rooms[session.room]`.
    pub fn insert(&self, session: Arc<Session>) {
        let room = session.room();
        self.sessions.insert(session.client_id, session.clone());
        self.rooms.entry(room).or_default().insert(session.client_id);
    }

    /// Removes a session from both maps, deleting the room entry if it
    /// becomes empty. Idempotent: removing an already-absent id is a no-op.
    pub fn remove(&self, client_id: u64) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&client_id)?;
        let room = session.room();
        if let Some(members) = self.rooms.get(&room) {
            members.remove(&client_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove(&room);
            }
        }
        Some(session)
    }

    pub fn lookup(&self, client_id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&client_id).map(|e| e.value().clone())
    }

    /// Snapshot copy of a room's current members. Callers iterate the
    /// returned `Vec` without holding any registry-internal lock.
    pub fn members_of(&self, room: &str) -> Vec<Arc<Session>> {
        let Some(ids) = self.rooms.get(room) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.sessions.get(&id).map(|e| e.value().clone()))
            .collect()
    }

    /// Moves `session` to `new_room`, returning the room it was in before the
    /// move. A no-op (returns the unchanged room) if `new_room` equals the
    /// current room.
    pub fn move_session(&self, session: &Arc<Session>, new_room: String) -> String {
        let old_room = session.room();
        if old_room == new_room {
            return old_room;
        }
        if let Some(members) = self.rooms.get(&old_room) {
            members.remove(&session.client_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove(&old_room);
            }
        }
        self.rooms
            .entry(new_room.clone())
            .or_default()
            .insert(session.client_id);
        session.set_room(new_room);
        old_room
    }

    /// Assigns and returns the next chat sequence number for `room`. Calls
    /// are totally ordered by `fetch_add`, so the order in which handlers
    /// reach this call is the order sequence numbers are handed out in,
    /// independent of wire arrival order (§4.7 tie-break rule).
    pub fn next_sequence(&self, room: &str) -> u64 {
        self.sequence_per_room
            .entry(room.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
