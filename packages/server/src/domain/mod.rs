//! Domain layer for the room relay.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod credential;
pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use credential::{PasswordDigest, digest};
pub use entity::{Member, Room, RoomSnapshot};
pub use error::{RegistryError, RoomError, ValueObjectError};
pub use factory::ConnectionIdFactory;
pub use repository::{
    JoinOutcome, JoinTicket, LeaveOutcome, OutboundSender, RoomRegistry, SessionBinding,
    SessionIndex,
};
pub use value_object::{ConnectionId, RoomCode, Timestamp, Username};

#[cfg(test)]
pub use repository::MockSessionIndex;
