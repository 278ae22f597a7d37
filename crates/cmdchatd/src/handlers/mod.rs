//! Per-payload-variant handlers (§4.7–§4.10). Each handler owns one
//! `Payload` variant's side effects; `dispatch` routes decoded frames here.

pub mod chat;
pub mod file;
pub mod rename;
pub mod switch_room;
pub mod system;

pub use chat::handle_chat;
pub use file::{handle_file_chunk, handle_file_init};
pub use rename::handle_rename;
pub use switch_room::handle_switch_room;
pub use system::handle_system;
