//! WebSocket message DTOs for the room relay protocol.
//!
//! Every frame is a JSON object `{"type": <event>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join(JoinPayload),
    CodeChange(CodeChangePayload),
    LeaveRoom(LeaveRoomPayload),
}

/// Join request; `initial_code` only matters when the join creates the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChangePayload {
    pub room: String,
    pub code: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomPayload {
    pub room: String,
    pub username: String,
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Sent only to the joining connection
    JoinSuccess {},
    /// Sent only to the joining connection
    JoinError { message: String },
    /// Sent only to the joining connection, after `JoinSuccess`
    InitialCode { code: String },
    /// Broadcast to the whole room including the sender
    CodeUpdate { code: String, username: String },
    UserJoined { username: String, users: Vec<String> },
    /// Skipped when the room is now empty
    UserLeft { username: String, users: Vec<String> },
}

impl ServerEvent {
    /// Serialize into one text frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Event name as it appears in the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSuccess {} => "joinSuccess",
            Self::JoinError { .. } => "joinError",
            Self::InitialCode { .. } => "initialCode",
            Self::CodeUpdate { .. } => "codeUpdate",
            Self::UserJoined { .. } => "userJoined",
            Self::UserLeft { .. } => "userLeft",
        }
    }
}
