//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 接続 ID から束縛を引き、退出処理を行うこと
//!
//! ### なぜこのテストが必要か
//! - 切断は任意のタイミングで起こるため、束縛が無くても安全に終わる必要がある
//! - 置き換えられた古い接続の切断が、新しい参加を消してはならない
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加中の接続の切断
//! - エッジケース：未参加の接続の切断、二重の切断、置き換え済み接続の切断

use std::sync::Arc;

use crate::domain::{ConnectionId, LeaveOutcome, RoomRegistry, SessionIndex};

use super::{error::LeaveError, leave_room::LeaveRoomUseCase, username_lock::UsernameLocks};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    index: Arc<dyn SessionIndex>,
    leave: LeaveRoomUseCase,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        index: Arc<dyn SessionIndex>,
        locks: UsernameLocks,
    ) -> Self {
        let leave = LeaveRoomUseCase::new(registry, index.clone(), locks);
        Self { index, leave }
    }

    /// 参加者切断を実行
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - 束縛が無かった（何もしない）
    /// * `Ok(Some(LeaveOutcome))` - 退出処理を行った
    pub async fn execute(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<LeaveOutcome>, LeaveError> {
        let Some((username, room)) = self.index.find_binding_by_connection(connection) else {
            tracing::debug!(%connection, "Disconnected without binding");
            return Ok(None);
        };

        // ロック待ちの間に同じユーザー名の別の参加に置き換えられていれば何もしない
        match self.leave.execute(&room, &username, connection).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(LeaveError::NotBound { .. }) => {
                tracing::debug!(%connection, %username, "Binding was superseded before disconnect");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
