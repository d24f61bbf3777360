//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::ValueObjectError;

/// join 処理のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// パスワード不一致（クライアントに joinError として通知される）
    #[error("Incorrect password")]
    IncorrectPassword,

    /// ルームコードまたはユーザー名が不正
    #[error("{0}")]
    InvalidRequest(#[from] ValueObjectError),

    /// 同じユーザー名が既にルームに参加している（不変条件違反）
    #[error("Username '{username}' is already joined to room '{room}'")]
    AlreadyJoined { username: String, room: String },

    /// ルームが作成と削除を繰り返し、参加できなかった
    #[error("Room '{0}' is unavailable, please retry")]
    RoomUnavailable(String),
}

/// codeChange 処理のエラー（いずれもクライアントには通知しない）
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChangeCodeError {
    /// 接続の束縛が要求のルーム・ユーザー名と一致しない
    #[error("Connection is not bound to room '{room}' as '{username}'")]
    NotBound { room: String, username: String },

    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    /// 束縛はあるがルーム側のメンバーではない（削除との競合など）
    #[error("'{username}' is not a member of room '{room}'")]
    NotAMember { room: String, username: String },
}

/// leaveRoom / 切断処理のエラー（いずれもクライアントには通知しない）
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaveError {
    /// 接続の束縛が要求のルーム・ユーザー名と一致しない
    #[error("Connection is not bound to room '{room}' as '{username}'")]
    NotBound { room: String, username: String },

    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    #[error("'{username}' is not a member of room '{room}'")]
    NotAMember { room: String, username: String },
}
