//! Error types for address-list parsing.

/// Result type alias for address operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Address parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Input ended inside a quoted string, comment, domain literal or angle address.
    #[error("Unexpected end of address list")]
    UnexpectedEnd,

    /// A character that cannot appear at this position.
    #[error("Unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset in the input.
        pos: usize,
    },

    /// Local part failed validation.
    #[error("Invalid mailbox: {0}")]
    InvalidMailbox(String),

    /// Domain failed validation.
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}
