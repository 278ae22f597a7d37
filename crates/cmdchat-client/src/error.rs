//! Top-level client error type (component M, client half). Collects the
//! typed errors from the transport/crypto/framing layers behind one enum for
//! the reconnect loop's backoff/notice decision, mirroring the original's
//! `perform_handshake` raising a single `RuntimeError` for every handshake
//! failure mode.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),
    #[error(transparent)]
    Framing(#[from] cmdchat_core::framing::FramingError),
    #[error(transparent)]
    Crypto(#[from] cmdchat_core::crypto::CryptoError),
    #[error("handshake rejected ({reason})")]
    HandshakeRejected { reason: String },
    #[error("unexpected handshake response from server")]
    UnexpectedHandshakeResponse,
    #[error("handshake response missing encrypted session key")]
    MissingEncryptedKey,
}
