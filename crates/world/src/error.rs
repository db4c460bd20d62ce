//! Error types for the world crate

use mudsync_core::{EntityKind, ServerIndex, SyncError};

/// Invariant violations raised while applying a message to the world
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A live list would grow past its fixed size
    #[error("Too many {kind} entities: capacity is {capacity}")]
    CapacityExceeded { kind: EntityKind, capacity: usize },

    /// A server index beyond the registry's slot arena
    #[error("{kind} index {index} is outside 0..{capacity}")]
    IndexOutOfRange {
        kind: EntityKind,
        index: ServerIndex,
        capacity: usize,
    },

    /// The same identity was placed in one tick's live list twice
    #[error("{kind} {index} listed twice in one tick")]
    DuplicateIndex { kind: EntityKind, index: ServerIndex },

    /// The message addresses more known entities than were live last tick
    #[error("Message updates {announced} known {kind} entities but only {available} were live")]
    KnownCountMismatch {
        kind: EntityKind,
        announced: usize,
        available: usize,
    },
}

impl From<WorldError> for SyncError {
    fn from(err: WorldError) -> Self {
        SyncError::Handler(err.to_string())
    }
}

/// Result type for world operations
pub type Result<T> = std::result::Result<T, WorldError>;
