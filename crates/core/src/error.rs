//! Core error types for MudSync

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// A read would have run past the end of the message.
    #[error("Truncated message: needed {needed} bits at bit {offset}, {available} available")]
    TruncatedMessage {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// An invariant was violated while applying a message.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether this error, raised while handling one message, must end the session.
    ///
    /// Unknown opcodes are dropped and the session carries on; everything
    /// else means the mirrored world can no longer be trusted.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, SyncError::UnknownOpcode(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
