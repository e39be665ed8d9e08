//! Error types for telshell.

use thiserror::Error;

/// Common error type for telshell operations.
#[derive(Error, Debug)]
pub enum TelshellError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer disconnected or the session's output path is gone.
    #[error("connection closed")]
    Closed,

    /// A terminal type with no entry in the capability table.
    #[error("unknown terminal type: {0}")]
    UnknownTerminal(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by an application command handler.
    #[error("{0}")]
    Command(String),
}

/// Result type alias for telshell operations.
pub type Result<T> = std::result::Result<T, TelshellError>;
