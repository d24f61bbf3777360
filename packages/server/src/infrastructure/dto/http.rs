//! HTTP API response DTOs for the room relay.

use serde::{Deserialize, Serialize};

/// Room summary for list and detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub room: String,
    pub users: Vec<String>,
    pub created_at: String, // RFC 3339
}
