//! InMemory Session Index 実装
//!
//! ユーザー名 → (ルーム, 接続) の束縛と、その逆引き（接続 → ユーザー名）を
//! 1 つのロックの下で同時に更新し、両者が食い違わないようにします。

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::domain::{ConnectionId, RoomCode, SessionBinding, SessionIndex, Username};

#[derive(Default)]
struct Bindings {
    by_username: HashMap<Username, (RoomCode, ConnectionId)>,
    by_connection: HashMap<ConnectionId, Username>,
}

/// インメモリ Session Index 実装
#[derive(Default)]
pub struct InMemorySessionIndex {
    bindings: Mutex<Bindings>,
}

impl InMemorySessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionIndex for InMemorySessionIndex {
    fn bind(
        &self,
        username: Username,
        room: RoomCode,
        connection: ConnectionId,
    ) -> Vec<SessionBinding> {
        let mut bindings = self.lock();
        let mut dropped = Vec::new();

        // 同じ接続が別のユーザー名で束縛されていれば外す（接続ごとに束縛は 1 つ）
        if let Some(previous_name) = bindings.by_connection.remove(&connection)
            && previous_name != username
            && let Some((old_room, _)) = bindings.by_username.remove(&previous_name)
        {
            dropped.push(SessionBinding {
                username: previous_name,
                room: old_room,
                connection: connection.clone(),
            });
        }

        let displaced = bindings
            .by_username
            .insert(username.clone(), (room.clone(), connection.clone()));
        bindings.by_connection.insert(connection.clone(), username.clone());

        if let Some((old_room, old_connection)) = displaced
            && (old_room != room || old_connection != connection)
        {
            if old_connection != connection {
                bindings.by_connection.remove(&old_connection);
            }
            dropped.push(SessionBinding {
                username,
                room: old_room,
                connection: old_connection,
            });
        }
        dropped
    }

    fn unbind(&self, username: &Username, room: &RoomCode, connection: &ConnectionId) -> bool {
        let mut bindings = self.lock();
        let matches = bindings
            .by_username
            .get(username)
            .is_some_and(|(r, c)| r == room && c == connection);
        if !matches {
            return false;
        }
        bindings.by_username.remove(username);
        bindings.by_connection.remove(connection);
        true
    }

    fn find_binding_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Option<(Username, RoomCode)> {
        let bindings = self.lock();
        let username = bindings.by_connection.get(connection)?;
        let (room, _) = bindings.by_username.get(username)?;
        Some((username.clone(), room.clone()))
    }

    fn find_binding_by_username(&self, username: &Username) -> Option<(RoomCode, ConnectionId)> {
        self.lock().by_username.get(username).cloned()
    }

    fn clear(&self) {
        let mut bindings = self.lock();
        bindings.by_username.clear();
        bindings.by_connection.clear();
    }

    fn binding_count(&self) -> usize {
        self.lock().by_username.len()
    }
}
