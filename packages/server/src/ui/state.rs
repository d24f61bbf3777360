//! Shared server state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    domain::{RoomRegistry, SessionIndex},
    infrastructure::repository::{InMemoryRoomRegistry, InMemorySessionIndex},
    usecase::UsernameLocks,
};

/// Shared application state
pub struct AppState {
    /// Room Registry（ルームの状態はアクターが専有）
    pub registry: Arc<dyn RoomRegistry>,
    /// Session Index（ユーザー名 → ルーム・接続の束縛）
    pub index: Arc<dyn SessionIndex>,
    /// Per-username locks shared by every connection
    pub locks: UsernameLocks,
    /// Flipped to `true` once graceful shutdown starts; open sockets close on it
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(registry: Arc<dyn RoomRegistry>, index: Arc<dyn SessionIndex>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            index,
            locks: UsernameLocks::new(),
            shutdown,
        }
    }

    /// State backed by the in-memory registry and index
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRoomRegistry::new()),
            Arc::new(InMemorySessionIndex::new()),
        )
    }
}
