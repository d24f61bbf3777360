//! UseCase: ルーム退出処理
//!
//! 明示的な leaveRoom、切断、別ルームへの参加による追い出しの全てがこの経路を通ります。
//! メンバー削除と束縛解除は、そのユーザー名のロックの下で続けて行います。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveRoomUseCase::execute() / leave_binding() / evict()
//! - メンバー削除と Session Index の束縛解除が両方行われること
//!
//! ### どのような状況を想定しているか
//! - 正常系：残りメンバーがいる退出、最後のメンバーの退出（ルーム削除）
//! - 異常系：束縛と一致しない退出要求、既に削除されたルームからの退出
//! - エッジケース：Index から既に外れた束縛のメンバー削除

use std::sync::Arc;

use crate::domain::{
    ConnectionId, LeaveOutcome, RegistryError, RoomCode, RoomRegistry, SessionBinding,
    SessionIndex, Username,
};

use super::{error::LeaveError, username_lock::UsernameLocks};

/// ルーム退出のユースケース
pub struct LeaveRoomUseCase {
    registry: Arc<dyn RoomRegistry>,
    index: Arc<dyn SessionIndex>,
    locks: UsernameLocks,
}

impl LeaveRoomUseCase {
    /// 新しい LeaveRoomUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        index: Arc<dyn SessionIndex>,
        locks: UsernameLocks,
    ) -> Self {
        Self {
            registry,
            index,
            locks,
        }
    }

    /// 接続自身の束縛に対する退出要求を実行
    ///
    /// ロック取得後の時点で、要求のルーム・ユーザー名が接続の束縛と一致しない場合は何もしない
    pub async fn execute(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, LeaveError> {
        let _guard = self.locks.acquire(username).await;
        match self.index.find_binding_by_connection(connection) {
            Some((bound_name, bound_room)) if &bound_name == username && &bound_room == room => {}
            _ => {
                return Err(LeaveError::NotBound {
                    room: room.as_str().to_string(),
                    username: username.as_str().to_string(),
                });
            }
        }
        self.leave_binding(room, username, connection).await
    }

    /// 束縛 1 つ分の退出処理（メンバー削除 → 束縛解除）
    ///
    /// 呼び出し側が `username` のロックを保持していること。
    /// ルームが既に存在しなくても束縛は解除する
    pub async fn leave_binding(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, LeaveError> {
        let result = self.remove_member(room, username, connection).await;
        self.index.unbind(username, room, connection);
        result
    }

    /// Session Index から既に外れた束縛について、ルーム側のメンバーだけを外す
    pub async fn evict(&self, binding: &SessionBinding) -> Result<LeaveOutcome, LeaveError> {
        let _guard = self.locks.acquire(&binding.username).await;
        self.remove_member(&binding.room, &binding.username, &binding.connection)
            .await
    }

    /// メンバー削除のみ。呼び出し側が `username` のロックを保持していること
    pub(crate) async fn remove_member(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, LeaveError> {
        match self.registry.leave(room, username, connection).await {
            Ok(outcome) => {
                tracing::info!(%room, %username, remaining = outcome.remaining, "Left room");
                Ok(outcome)
            }
            Err(RegistryError::RoomNotFound(_) | RegistryError::Retired(_)) => {
                Err(LeaveError::RoomNotFound(room.as_str().to_string()))
            }
            Err(RegistryError::Room(_)) => Err(LeaveError::NotAMember {
                room: room.as_str().to_string(),
                username: username.as_str().to_string(),
            }),
        }
    }
}
