//! Client counterpart of the SyncRoom relay.
//!
//! Provides the protocol session ([`RoomClient`]), the editor capability
//! interface ([`ContentEditor`]) and the command parser used by the CLI.

pub mod command;
pub mod connection;
pub mod editor;
pub mod error;

pub use command::Command;
pub use connection::{RoomClient, RoomEvent};
pub use editor::{ContentEditor, EchoGuard, LineBufferEditor};
pub use error::ClientError;
