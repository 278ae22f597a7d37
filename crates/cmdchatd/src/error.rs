//! Typed error taxonomy (component M) mirroring the policy table in §7 of
//! the spec this daemon implements one-to-one: each variant here is a row of
//! that table, and the `reason` strings on [`HandshakeError`] are the exact
//! wire values sent back in a `handshake_error` frame.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("expected_handshake")]
    ExpectedHandshake,
    #[error("missing_public_key")]
    MissingPublicKey,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid_public_key")]
    InvalidPublicKey,
    #[error(transparent)]
    Framing(#[from] cmdchat_core::framing::FramingError),
}

impl HandshakeError {
    /// The exact `reason` string sent to the client in `handshake_error`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ExpectedHandshake => "expected_handshake",
            Self::MissingPublicKey => "missing_public_key",
            Self::Unauthorized => "unauthorized",
            Self::InvalidPublicKey => "invalid_public_key",
            Self::Framing(_) => "expected_handshake",
        }
    }
}

/// A fatal condition in the post-handshake dispatcher loop (§4.6, §7). Every
/// variant here is an expected, typed shutdown reason and produces only the
/// single "X left the chat." teardown broadcast. The "X disconnected
/// unexpectedly." double broadcast is reserved for the one case this type
/// can't represent: the per-connection task panicking, which the acceptor
/// observes as a `JoinError` from `tokio::spawn` rather than as a value of
/// this enum (DESIGN.md Open Question #2).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("framing error: {0}")]
    Framing(#[from] cmdchat_core::framing::FramingError),
    #[error("peer sent cleartext after the handshake")]
    UnexpectedCleartext,
    #[error("envelope decrypt/parse failure")]
    DecryptFailure,
    #[error("unknown payload type")]
    UnknownPayloadType,
    #[error("write failure: {0}")]
    Write(#[from] cmdchat_services::broadcast::SendError),
}
