//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// Username validation error
    #[error("Username cannot be empty")]
    UsernameEmpty,

    /// RoomCode validation error
    #[error("Room code cannot be empty")]
    RoomCodeEmpty,

    /// ConnectionId invalid format error (not a valid UUID format)
    #[error("ConnectionId must be a valid UUID format (got: {0})")]
    ConnectionIdInvalidFormat(String),
}

/// Errors related to Room domain logic
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The supplied password digest does not match the room's sealed digest
    #[error("Incorrect password")]
    AuthenticationFailed,

    /// The username already holds a membership in this room
    #[error("'{0}' is already a member of this room")]
    AlreadyMember(String),

    /// The username is not a member, or its membership belongs to another connection
    #[error("'{0}' is not a member of this room on this connection")]
    NotAMember(String),
}

/// Errors reported by the room registry and session index implementations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    /// The room's owner retired between lookup and delivery; the caller may re-resolve
    #[error("Room '{0}' was retired")]
    Retired(String),

    #[error(transparent)]
    Room(#[from] RoomError),
}
