//! InMemory Room Registry 実装
//!
//! ドメイン層が定義する RoomRegistry trait の具体的な実装。
//! ルームごとに 1 つのアクター（`RoomActor`）が状態を専有し、
//! この構造体はルームコードからアクターを引く表だけを管理します。
//! 表のロックはハンドルの検索・登録・削除の間だけ保持し、`await` をまたぎません。
//! そのため、あるルームの処理が別のルームの処理を待たせることはありません。

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;

use crate::domain::{
    ConnectionId, JoinOutcome, JoinTicket, LeaveOutcome, PasswordDigest, RegistryError,
    RoomCode, RoomRegistry, RoomSnapshot, Username,
};

use super::room_actor::{RoomActor, RoomCommand, RoomHandle, RoomTable};

/// 引退したアクターに当たった join を引き直す上限回数
const MAX_JOIN_ATTEMPTS: usize = 8;

/// インメモリ Room Registry 実装
pub struct InMemoryRoomRegistry {
    table: RoomTable,
    next_actor_id: AtomicU64,
}

impl Default for InMemoryRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRegistry {
    /// 空の InMemoryRoomRegistry を作成
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            next_actor_id: AtomicU64::new(1),
        }
    }

    /// ルームを取得し、存在しなければ指定の初期内容とダイジェストで作成する
    ///
    /// 既存のルームは変更せずに返す（初期内容とダイジェストは無視される）。
    /// 認証は行わないので、メンバーを追加する前に呼び出し側で検証すること。
    pub(crate) fn get_or_create(
        &self,
        room: &RoomCode,
        initial_content: Option<String>,
        digest: &PasswordDigest,
    ) -> (RoomHandle, bool) {
        let mut table = self.lock_table();
        if let Some(handle) = table.get(room) {
            return (handle.clone(), false);
        }

        let id = self.next_actor_id.fetch_add(1, Ordering::Relaxed);
        let handle = RoomActor::spawn(
            id,
            room.clone(),
            initial_content.unwrap_or_default(),
            digest.clone(),
            Arc::clone(&self.table),
        );
        table.insert(room.clone(), handle.clone());
        tracing::info!(%room, "Room created");
        (handle, true)
    }

    fn get(&self, room: &RoomCode) -> Option<RoomHandle> {
        self.lock_table().get(room).cloned()
    }

    /// 表に登録されているルーム数
    pub fn room_count(&self) -> usize {
        self.lock_table().len()
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<RoomCode, RoomHandle>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 引退済みのルームへの操作は「ルームなし」として扱う
fn retired_as_not_found(error: RegistryError) -> RegistryError {
    match error {
        RegistryError::Retired(room) => RegistryError::RoomNotFound(room),
        other => other,
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn validate(&self, room: &RoomCode, digest: &PasswordDigest) -> bool {
        let Some(handle) = self.get(room) else {
            return true;
        };
        handle
            .request(|reply| RoomCommand::Validate {
                digest: digest.clone(),
                reply,
            })
            .await
            // 問い合わせ中に削除されたなら、どのパスワードでも作り直せる
            .unwrap_or(true)
    }

    async fn join(&self, ticket: JoinTicket) -> Result<JoinOutcome, RegistryError> {
        for attempt in 1..=MAX_JOIN_ATTEMPTS {
            let (handle, created) =
                self.get_or_create(&ticket.room, ticket.initial_content.clone(), &ticket.digest);

            let result = handle
                .request(|reply| RoomCommand::Join {
                    username: ticket.username.clone(),
                    connection: ticket.connection.clone(),
                    sender: ticket.sender.clone(),
                    digest: ticket.digest.clone(),
                    reply,
                })
                .await
                .and_then(|result| result);

            match result {
                Ok(outcome) => return Ok(JoinOutcome { created, ..outcome }),
                Err(RegistryError::Retired(_)) => {
                    tracing::debug!(room = %ticket.room, attempt, "Room retired during join, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(room = %ticket.room, "Gave up joining a room that keeps retiring");
        Err(RegistryError::RoomNotFound(ticket.room.into_string()))
    }

    async fn change_code(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
        content: String,
    ) -> Result<(), RegistryError> {
        let handle = self
            .get(room)
            .ok_or_else(|| RegistryError::RoomNotFound(room.as_str().to_string()))?;
        handle
            .request(|reply| RoomCommand::ChangeCode {
                username: username.clone(),
                connection: connection.clone(),
                content,
                reply,
            })
            .await
            .and_then(|result| result)
            .map_err(retired_as_not_found)
    }

    async fn leave(
        &self,
        room: &RoomCode,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, RegistryError> {
        let handle = self
            .get(room)
            .ok_or_else(|| RegistryError::RoomNotFound(room.as_str().to_string()))?;
        handle
            .request(|reply| RoomCommand::Leave {
                username: username.clone(),
                connection: connection.clone(),
                reply,
            })
            .await
            .and_then(|result| result)
            .map_err(retired_as_not_found)
    }

    async fn get_buffer(&self, room: &RoomCode) -> Result<String, RegistryError> {
        let handle = self
            .get(room)
            .ok_or_else(|| RegistryError::RoomNotFound(room.as_str().to_string()))?;
        handle
            .request(|reply| RoomCommand::GetBuffer { reply })
            .await
            .and_then(|result| result)
            .map_err(retired_as_not_found)
    }

    async fn snapshot(&self, room: &RoomCode) -> Option<RoomSnapshot> {
        let handle = self.get(room)?;
        handle
            .request(|reply| RoomCommand::Snapshot { reply })
            .await
            .ok()
            .flatten()
    }

    async fn list(&self) -> Vec<RoomSnapshot> {
        let handles: Vec<RoomHandle> = self.lock_table().values().cloned().collect();

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(Some(snapshot)) = handle
                .request(|reply| RoomCommand::Snapshot { reply })
                .await
            {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| a.code.cmp(&b.code));
        snapshots
    }

    async fn clear(&self) {
        let drained: Vec<RoomHandle> = self.lock_table().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.shutdown();
        }
        tracing::info!(rooms = drained.len(), "All rooms cleared");
    }
}
