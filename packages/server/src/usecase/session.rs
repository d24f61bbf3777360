//! UseCase: 接続 1 本分のセッション処理
//!
//! WebSocket の受信ループから受け取ったイベントを 1 件ずつ処理し、
//! 接続の状態（未参加 / 参加中）を管理します。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectionSession::handle_text() / disconnect()
//! - クライアントから見たイベントの順序と内容
//!
//! ### なぜこのテストが必要か
//! - join → 編集 → 切断 → 退出の一連の流れで、各参加者が受け取るイベントを保証する
//! - 不正なフレームでセッションが壊れないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：2 人での共同編集
//! - 異常系：パスワード不一致、不正な JSON、不正なユーザー名
//! - 並行：多数の接続が同じユーザー名を取り合いながら参加・編集・切断を繰り返す

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, OutboundSender, RoomCode, RoomRegistry, SessionIndex, Username},
    infrastructure::dto::websocket::{
        ClientEvent, CodeChangePayload, JoinPayload, LeaveRoomPayload, ServerEvent,
    },
};

use super::{
    change_code::ChangeCodeUseCase,
    disconnect_participant::DisconnectParticipantUseCase,
    error::JoinError,
    join_room::{JoinCommand, JoinRoomUseCase},
    leave_room::LeaveRoomUseCase,
    username_lock::UsernameLocks,
};

/// 接続の状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined { room: RoomCode, username: Username },
}

/// 接続 1 本分のセッション
pub struct ConnectionSession {
    connection: ConnectionId,
    sender: OutboundSender,
    state: SessionState,
    index: Arc<dyn SessionIndex>,
    join: JoinRoomUseCase,
    change_code: ChangeCodeUseCase,
    leave: LeaveRoomUseCase,
    disconnect: DisconnectParticipantUseCase,
}

impl ConnectionSession {
    /// 新しいセッションを作成
    ///
    /// `sender` はこの接続の送信タスクへのチャンネル。
    /// `locks` は全ての接続で同じ表を共有すること
    pub fn new(
        connection: ConnectionId,
        sender: OutboundSender,
        registry: Arc<dyn RoomRegistry>,
        index: Arc<dyn SessionIndex>,
        locks: UsernameLocks,
    ) -> Self {
        Self {
            connection,
            sender,
            state: SessionState::Unjoined,
            join: JoinRoomUseCase::new(registry.clone(), index.clone(), locks.clone()),
            change_code: ChangeCodeUseCase::new(registry.clone(), index.clone()),
            leave: LeaveRoomUseCase::new(registry.clone(), index.clone(), locks.clone()),
            disconnect: DisconnectParticipantUseCase::new(registry, index.clone(), locks),
            index,
        }
    }

    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// テキストフレーム 1 件を処理する。解析できないフレームはログに残して無視する
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                tracing::warn!(connection = %self.connection, error = %e, "Ignored malformed frame");
            }
        }
    }

    /// クライアントイベント 1 件を処理する
    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Join(payload) => self.on_join(payload).await,
            ClientEvent::CodeChange(payload) => self.on_code_change(payload).await,
            ClientEvent::LeaveRoom(payload) => self.on_leave_room(payload).await,
        }
        self.refresh_state();
    }

    /// 切断時の後始末。何度呼んでもよい
    pub async fn disconnect(&mut self) {
        match self.disconnect.execute(&self.connection).await {
            Ok(Some(outcome)) => {
                tracing::info!(connection = %self.connection, remaining = outcome.remaining, "Disconnected from room");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(connection = %self.connection, error = %e, "Disconnect cleanup failed");
            }
        }
        self.state = SessionState::Unjoined;
    }

    async fn on_join(&mut self, payload: JoinPayload) {
        let JoinPayload {
            room,
            username,
            password,
            initial_code,
        } = payload;

        let identifiers = RoomCode::new(room)
            .and_then(|room| Username::new(username).map(|username| (room, username)));
        let (room, username) = match identifiers {
            Ok(identifiers) => identifiers,
            Err(e) => {
                tracing::warn!(connection = %self.connection, error = %e, "Invalid join request");
                self.reply_join_error(&JoinError::from(e));
                return;
            }
        };

        let command = JoinCommand {
            room,
            username,
            password,
            initial_content: initial_code,
            connection: self.connection.clone(),
            sender: self.sender.clone(),
        };
        if let Err(e) = self.join.execute(command).await {
            match &e {
                JoinError::IncorrectPassword => {}
                other => tracing::error!(connection = %self.connection, error = %other, "Join failed"),
            }
            self.reply_join_error(&e);
        }
    }

    async fn on_code_change(&mut self, payload: CodeChangePayload) {
        let Some((room, username)) = self.parse_identifiers(payload.room, payload.username) else {
            return;
        };
        if let Err(e) = self
            .change_code
            .execute(&room, &username, &self.connection, payload.code)
            .await
        {
            tracing::warn!(connection = %self.connection, error = %e, "Dropped code change");
        }
    }

    async fn on_leave_room(&mut self, payload: LeaveRoomPayload) {
        let Some((room, username)) = self.parse_identifiers(payload.room, payload.username) else {
            return;
        };
        if let Err(e) = self.leave.execute(&room, &username, &self.connection).await {
            tracing::warn!(connection = %self.connection, error = %e, "Dropped leave request");
        }
    }

    fn parse_identifiers(&self, room: String, username: String) -> Option<(RoomCode, Username)> {
        let parsed = RoomCode::new(room)
            .and_then(|room| Username::new(username).map(|username| (room, username)));
        match parsed {
            Ok(identifiers) => Some(identifiers),
            Err(e) => {
                tracing::warn!(connection = %self.connection, error = %e, "Ignored event with invalid identifiers");
                None
            }
        }
    }

    fn reply_join_error(&self, error: &JoinError) {
        let event = ServerEvent::JoinError {
            message: error.to_string(),
        };
        match event.to_frame() {
            Ok(frame) => {
                if self.sender.send(frame).is_err() {
                    tracing::debug!(connection = %self.connection, "Connection closed before joinError");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize joinError"),
        }
    }

    /// 束縛は他の接続の join で外されることもあるため、Session Index を正とする
    fn refresh_state(&mut self) {
        self.state = match self.index.find_binding_by_connection(&self.connection) {
            Some((username, room)) => SessionState::Joined { room, username },
            None => SessionState::Unjoined,
        };
    }
}
