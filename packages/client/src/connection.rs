//! Protocol session with the relay over WebSocket.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use syncroom_server::infrastructure::dto::websocket::{
    ClientEvent, CodeChangePayload, JoinPayload, LeaveRoomPayload, ServerEvent,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events surfaced to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Joined,
    JoinRejected(String),
    /// Buffer at the time of joining
    InitialContent(String),
    /// Another user replaced the buffer
    RemoteContent { code: String, username: String },
    UserJoined { username: String, users: Vec<String> },
    UserLeft { username: String, users: Vec<String> },
}

impl RoomEvent {
    /// Translate a server event; our own `codeUpdate` echoes are dropped
    pub fn from_server(event: ServerEvent, own_username: Option<&str>) -> Option<Self> {
        match event {
            ServerEvent::JoinSuccess {} => Some(Self::Joined),
            ServerEvent::JoinError { message } => Some(Self::JoinRejected(message)),
            ServerEvent::InitialCode { code } => Some(Self::InitialContent(code)),
            ServerEvent::CodeUpdate { username, .. } if Some(username.as_str()) == own_username => {
                None
            }
            ServerEvent::CodeUpdate { code, username } => {
                Some(Self::RemoteContent { code, username })
            }
            ServerEvent::UserJoined { username, users } => Some(Self::UserJoined { username, users }),
            ServerEvent::UserLeft { username, users } => Some(Self::UserLeft { username, users }),
        }
    }
}

/// Current room and username, set once a join is sent
#[derive(Debug, Clone)]
struct Identity {
    room: String,
    username: String,
}

/// A connection to the relay
pub struct RoomClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    identity: Option<Identity>,
}

impl RoomClient {
    /// Open the WebSocket, e.g. `ws://127.0.0.1:3000/ws`
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await?;
        tracing::info!("Connected to {}", url);
        let (sink, stream) = socket.split();
        Ok(Self {
            sink,
            stream,
            identity: None,
        })
    }

    pub fn room(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.room.as_str())
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    /// Send `join`. The outcome arrives as [`RoomEvent::Joined`] or [`RoomEvent::JoinRejected`]
    pub async fn join(
        &mut self,
        room: &str,
        username: &str,
        password: &str,
        initial_code: Option<String>,
    ) -> Result<(), ClientError> {
        self.identity = Some(Identity {
            room: room.to_string(),
            username: username.to_string(),
        });
        self.send(ClientEvent::Join(JoinPayload {
            room: room.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            initial_code,
        }))
        .await
    }

    /// Replace the room buffer
    pub async fn send_code(&mut self, code: String) -> Result<(), ClientError> {
        let identity = self.identity.clone().ok_or(ClientError::NotJoined)?;
        self.send(ClientEvent::CodeChange(CodeChangePayload {
            room: identity.room,
            code,
            username: identity.username,
        }))
        .await
    }

    pub async fn leave(&mut self) -> Result<(), ClientError> {
        let identity = self.identity.take().ok_or(ClientError::NotJoined)?;
        self.send(ClientEvent::LeaveRoom(LeaveRoomPayload {
            room: identity.room,
            username: identity.username,
        }))
        .await
    }

    /// Next event from the room, `None` once the connection is closed.
    ///
    /// Cancel safe: a frame is consumed only when its event is returned or dropped.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        while let Some(msg) = self.stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("WebSocket error: {}", e);
                    break;
                }
            };

            let event = match serde_json::from_str::<ServerEvent>(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Ignored malformed frame: {}", e);
                    continue;
                }
            };
            if let ServerEvent::JoinError { .. } = &event {
                self.identity = None;
            }
            if let Some(event) = RoomEvent::from_server(event, self.username()) {
                return Some(event);
            }
        }
        None
    }

    /// Close the connection (the server treats this as a disconnect)
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.sink.close().await?;
        Ok(())
    }

    async fn send(&mut self, event: ClientEvent) -> Result<(), ClientError> {
        let frame = serde_json::to_string(&event)?;
        self.sink.send(Message::Text(frame.into())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_code_update_is_dropped() {
        // テスト項目: 自分の codeUpdate は無視される
        // given (前提条件):
        let event = ServerEvent::CodeUpdate {
            code: "x".to_string(),
            username: "alice".to_string(),
        };

        // when (操作):
        let result = RoomEvent::from_server(event, Some("alice"));

        // then (期待する結果):
        assert_eq!(result, None);
    }

    #[test]
    fn test_other_code_update_is_surfaced() {
        // テスト項目: 他人の codeUpdate はリモート変更として届く
        // given (前提条件):
        let event = ServerEvent::CodeUpdate {
            code: "x".to_string(),
            username: "bob".to_string(),
        };

        // when (操作):
        let result = RoomEvent::from_server(event, Some("alice"));

        // then (期待する結果):
        assert_eq!(
            result,
            Some(RoomEvent::RemoteContent {
                code: "x".to_string(),
                username: "bob".to_string()
            })
        );
    }

    #[test]
    fn test_join_error_message_is_kept() {
        // テスト項目: joinError のメッセージがそのまま渡される
        // when (操作):
        let result = RoomEvent::from_server(
            ServerEvent::JoinError {
                message: "Incorrect password".to_string(),
            },
            None,
        );

        // then (期待する結果):
        assert_eq!(
            result,
            Some(RoomEvent::JoinRejected("Incorrect password".to_string()))
        );
    }
}
