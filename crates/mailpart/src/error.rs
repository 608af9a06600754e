//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Missing boundary in multipart message.
    #[error("Missing boundary in multipart message")]
    MissingBoundary,

    /// No part with the requested MIME ID.
    #[error("MIME part not found: {0}")]
    PartNotFound(String),

    /// Malformed dotted MIME ID.
    #[error("Invalid MIME ID: {0}")]
    InvalidMimeId(String),

    /// Address list error.
    #[error("Address error: {0}")]
    Address(#[from] mailpart_address::Error),

    /// I/O error while streaming contents.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
