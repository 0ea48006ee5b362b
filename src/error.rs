use thiserror::Error;

/// Contract violations raised by the canvas and by action constructors.
///
/// Obsolete actions, empty history stacks and gated cleanups are expected
/// conditions and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchematicError {
    #[error("vertex no longer exists")]
    DeadVertex,
    #[error("terminal no longer exists")]
    DeadTerminal,
    #[error("handle no longer exists")]
    DeadHandle,
    #[error("connector no longer exists")]
    DeadConnector,
    #[error("handle {0} is already connected")]
    HandleBusy(String),
    #[error("cannot connect handle {0} to itself")]
    SelfConnection(String),
    #[error("handles {0} and {1} belong to the same entity")]
    SameOwner(String, String),
    #[error("handles {0} and {1} have the same class")]
    ClassMismatch(String, String),
    #[error("handle {0} is not owned by a vertex")]
    NotVertexHandle(String),
    #[error("undo limit must be at least 1 (got {0})")]
    InvalidLimit(usize),
    #[error("no live object named {0}")]
    UnknownTarget(String),
    #[error("an object named {0} already exists")]
    DuplicateName(String),
}
