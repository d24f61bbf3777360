//! ユーザー名ごとの非同期ロック
//!
//! ルームのメンバー（ルームアクター内）と Session Index の束縛は別々に更新されるため、
//! 同じユーザー名に対する「束縛の解除 → 参加 → 束縛」の一連の処理をこのロックで直列化します。
//! ロックの下では「束縛がある ⇔ そのルームにメンバーがいる」が常に成り立ちます。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::Username;

type LockTable = HashMap<Username, Arc<AsyncMutex<()>>>;

/// ユーザー名ごとのロック表。クローンは同じ表を共有する
#[derive(Clone, Default)]
pub struct UsernameLocks {
    table: Arc<Mutex<LockTable>>,
}

impl UsernameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `username` のロックを取得する。他のタスクが保持していれば解放まで待つ
    pub async fn acquire(&self, username: &Username) -> UsernameGuard {
        let mutex = self
            .lock_table()
            .entry(username.clone())
            .or_default()
            .clone();
        let guard = mutex.lock_owned().await;
        UsernameGuard {
            locks: self.clone(),
            username: username.clone(),
            _guard: guard,
        }
    }

    /// 保持中または待機中のロックの数
    pub fn len(&self) -> usize {
        self.lock_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 取得したロック。drop で解放され、待っているタスクが無ければ表からも消える
pub struct UsernameGuard {
    locks: UsernameLocks,
    username: Username,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for UsernameGuard {
    fn drop(&mut self) {
        let mut table = self.locks.lock_table();
        // 表と自分のガードの 2 つだけが参照していれば、待っているタスクはいない
        if table
            .get(&self.username)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 2)
        {
            table.remove(&self.username);
        }
    }
}
