//! Repository traits for room state and session bindings.
//!
//! The usecase layer depends on these traits only; implementations live in
//! `infrastructure::repository` (dependency inversion).

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::{
    credential::PasswordDigest,
    entity::RoomSnapshot,
    error::RegistryError,
    value_object::{ConnectionId, RoomCode, Username},
};

/// Outbound channel of one connection; every item is one serialized frame.
pub type OutboundSender = UnboundedSender<String>;

/// Everything the registry needs to admit a member into a room
#[derive(Debug, Clone)]
pub struct JoinTicket {
    pub room: RoomCode,
    pub username: Username,
    pub connection: ConnectionId,
    pub sender: OutboundSender,
    pub digest: PasswordDigest,
    /// Only honored when the join creates the room
    pub initial_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Whether this join created the room
    pub created: bool,
    /// Members after the join, in join order
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Members left in the room; zero means the room was deleted
    pub remaining: usize,
}

/// Owner of all live rooms.
///
/// Every mutating operation also performs the matching fan-out, and both happen
/// in one per-room critical section so members observe broadcasts in mutation order.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// True if the room does not exist or its sealed digest equals `digest`
    async fn validate(&self, room: &RoomCode, digest: &PasswordDigest) -> bool;

    /// Create-on-demand, authenticate, add the member, reply `joinSuccess` and
    /// `initialCode` to the joiner and broadcast `userJoined` to the room
    async fn join(&self, ticket: JoinTicket) -> Result<JoinOutcome, RegistryError>;

    /// Replace the room buffer and broadcast `codeUpdate` to every member
    async fn change_code(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
        content: String,
    ) -> Result<(), RegistryError>;

    /// Remove the member; broadcast `userLeft` or delete the room when it drains
    async fn leave(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, RegistryError>;

    /// Current buffer content of a room
    async fn get_buffer(&self, room: &RoomCode) -> Result<String, RegistryError>;

    /// Summary of one live room
    async fn snapshot(&self, room: &RoomCode) -> Option<RoomSnapshot>;

    /// Summaries of all live rooms, sorted by room code
    async fn list(&self) -> Vec<RoomSnapshot>;

    /// Drop every room
    async fn clear(&self);
}

/// The (username, room) → connection binding of one live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub username: Username,
    pub room: RoomCode,
    pub connection: ConnectionId,
}

/// Index of live session bindings. A username holds at most one binding system-wide.
#[cfg_attr(test, mockall::automock)]
pub trait SessionIndex: Send + Sync {
    /// Bind `username` to `room` through `connection`.
    ///
    /// Returns every binding this drops: the connection's binding under another
    /// username and the username's binding on another room or connection.
    fn bind(
        &self,
        username: Username,
        room: RoomCode,
        connection: ConnectionId,
    ) -> Vec<SessionBinding>;

    /// Remove the binding only if it still matches; returns whether anything was removed
    fn unbind(&self, username: &Username, room: &RoomCode, connection: &ConnectionId) -> bool;

    fn find_binding_by_connection(&self, connection: &ConnectionId)
    -> Option<(Username, RoomCode)>;

    fn find_binding_by_username(&self, username: &Username) -> Option<(RoomCode, ConnectionId)>;

    /// Drop every binding
    fn clear(&self);

    fn binding_count(&self) -> usize;
}
