//! UseCase: 全ルーム削除（管理用）

use std::sync::Arc;

use crate::domain::{RoomRegistry, SessionIndex};

/// 全ルームと全束縛を削除するユースケース
pub struct ClearRoomsUseCase {
    registry: Arc<dyn RoomRegistry>,
    index: Arc<dyn SessionIndex>,
}

impl ClearRoomsUseCase {
    pub fn new(registry: Arc<dyn RoomRegistry>, index: Arc<dyn SessionIndex>) -> Self {
        Self { registry, index }
    }

    /// 全ルームを削除する。接続自体は切断しない
    pub async fn execute(&self) {
        self.registry.clear().await;
        self.index.clear();
    }
}
