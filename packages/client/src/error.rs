//! Client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// codeChange / leaveRoom before a join was sent
    #[error("Not joined to any room")]
    NotJoined,

    #[error("Unknown command ':{0}'")]
    UnknownCommand(String),
}
