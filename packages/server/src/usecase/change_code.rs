//! UseCase: コード変更処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChangeCodeUseCase::execute() メソッド
//! - バッファの更新と、送信者を含むルーム全員への codeUpdate 配信
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加中のルームへの変更
//! - 異常系：束縛と一致しない要求（他ルーム・他ユーザー名）、削除済みルーム

use std::sync::Arc;

use crate::domain::{ConnectionId, RegistryError, RoomCode, RoomRegistry, SessionIndex, Username};

use super::error::ChangeCodeError;

/// コード変更のユースケース
pub struct ChangeCodeUseCase {
    registry: Arc<dyn RoomRegistry>,
    index: Arc<dyn SessionIndex>,
}

impl ChangeCodeUseCase {
    /// 新しい ChangeCodeUseCase を作成
    pub fn new(registry: Arc<dyn RoomRegistry>, index: Arc<dyn SessionIndex>) -> Self {
        Self { registry, index }
    }

    /// コード変更を実行
    ///
    /// 要求のルーム・ユーザー名が接続の束縛と一致する場合のみバッファを置き換える（後勝ち）
    pub async fn execute(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
        code: String,
    ) -> Result<(), ChangeCodeError> {
        match self.index.find_binding_by_connection(connection) {
            Some((bound_name, bound_room)) if &bound_name == username && &bound_room == room => {}
            _ => {
                return Err(ChangeCodeError::NotBound {
                    room: room.as_str().to_string(),
                    username: username.as_str().to_string(),
                });
            }
        }

        self.registry
            .change_code(room, username, connection, code)
            .await
            .map_err(|e| match e {
                RegistryError::RoomNotFound(_) | RegistryError::Retired(_) => {
                    ChangeCodeError::RoomNotFound(room.as_str().to_string())
                }
                RegistryError::Room(_) => ChangeCodeError::NotAMember {
                    room: room.as_str().to_string(),
                    username: username.as_str().to_string(),
                },
            })?;

        tracing::debug!(%room, %username, "Code updated");
        Ok(())
    }
}
