//! Error types for the chat core.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while establishing or using a chat session.
///
/// Any `Authentication` error is treated as a potential active attack:
/// during a handshake it aborts the attempt, and during an established
/// session it is fatal to that session.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Malformed wire data (bad framing, JSON, base64, or message count).
    #[error("Malformed wire data: {0}")]
    Decode(String),

    /// Integrity tag or challenge verification failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Keypair generation or shared-secret computation failed.
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// Transport or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No password on file for the claimed peer.
    #[error("No password on file for peer: {0}")]
    UnknownPeer(String),

    /// No response within the per-step deadline.
    #[error("No response within {0:?}")]
    Timeout(Duration),
}
