//! cmdchat-services — the process-wide session/room registry, the per-session
//! rate limiter, and the broadcaster that fans a payload out to a room.
//!
//! Structurally grounded on the teacher's `summit-services` crate: shared
//! mutable state lives behind `DashMap`s reached through an `Arc`-cloneable
//! handle, constructed with a `new_*()` free function, the way
//! `summit-services::session::new_session_table` and
//! `summit-services::peer::new_registry` are.

pub mod broadcast;
pub mod rate_limit;
pub mod registry;
pub mod session;

pub use broadcast::broadcast;
pub use rate_limit::RateWindow;
pub use registry::Registry;
pub use session::{Session, Sink};
