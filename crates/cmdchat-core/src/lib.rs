//! cmdchat-core — wire framing, cryptographic primitives, message types, and
//! the boundary normalization rules shared by server and client.
//! All other cmdchat crates depend on this one.

pub mod crypto;
pub mod framing;
pub mod message;
pub mod sanitize;
pub mod time;

pub use crypto::{AeadCipher, CryptoError, RsaKeyPair};
pub use framing::{read_frame, write_frame, FramingError, MAX_FRAME_SIZE};
pub use message::{Envelope, Handshake, HandshakeOk, Payload};
