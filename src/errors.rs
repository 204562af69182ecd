//! Error types for the chat runtime.
//!
//! The runtime has no fatal error class: transport and storage failures are
//! recovered at the call site and surfaced to the user as chat content (or
//! not at all). These enums exist so the recovery sites can log something
//! meaningful.

use thiserror::Error;

/// Errors raised by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (connection refused, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status code.
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    /// The reply body was not the expected JSON envelope.
    #[error("failed to decode backend reply: {message}")]
    Decode { message: String },
}

/// Errors raised by a [`PersistenceStore`](crate::store::PersistenceStore)
/// implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be rendered to JSON.
    #[error("failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}
