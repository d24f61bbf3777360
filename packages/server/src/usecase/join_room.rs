//! UseCase: ルーム参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - パスワード検証、以前の束縛の解除、参加、Session Index への束縛
//!
//! ### なぜこのテストが必要か
//! - ユーザー名はシステム全体で 1 つの束縛しか持てない（別ルームへの参加で前のルームから外れる）
//! - パスワード不一致の join はルームの状態を一切変えてはならない
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規ルーム作成、既存ルームへの参加、別ルームへの移動
//! - 異常系：パスワード不一致（検証後に別のパスワードでルームが作られた場合を含む）
//! - 並行：同じユーザー名での同時参加

use std::sync::Arc;

use crate::domain::{
    ConnectionId, JoinOutcome, JoinTicket, OutboundSender, RegistryError, RoomCode, RoomError,
    RoomRegistry, SessionIndex, Username, digest,
};

use super::{error::JoinError, leave_room::LeaveRoomUseCase, username_lock::UsernameLocks};

/// join 要求の内容
#[derive(Debug, Clone)]
pub struct JoinCommand {
    pub room: RoomCode,
    pub username: Username,
    pub password: String,
    pub initial_content: Option<String>,
    pub connection: ConnectionId,
    pub sender: OutboundSender,
}

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    registry: Arc<dyn RoomRegistry>,
    index: Arc<dyn SessionIndex>,
    locks: UsernameLocks,
    leave: LeaveRoomUseCase,
}

impl JoinRoomUseCase {
    /// 新しい JoinRoomUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        index: Arc<dyn SessionIndex>,
        locks: UsernameLocks,
    ) -> Self {
        let leave = LeaveRoomUseCase::new(registry.clone(), index.clone(), locks.clone());
        Self {
            registry,
            index,
            locks,
            leave,
        }
    }

    /// ルーム参加を実行
    ///
    /// 成功時、参加者には joinSuccess → initialCode が、ルーム全体には userJoined が配信済み
    ///
    /// # Returns
    ///
    /// * `Ok(JoinOutcome)` - 参加成功
    /// * `Err(JoinError::IncorrectPassword)` - パスワード不一致（状態は変化しない）
    pub async fn execute(&self, command: JoinCommand) -> Result<JoinOutcome, JoinError> {
        let JoinCommand {
            room,
            username,
            password,
            initial_content,
            connection,
            sender,
        } = command;

        // 1. パスワード検証（存在しないルームはどのパスワードでも通る）
        let digest = digest(&password);
        if !self.registry.validate(&room, &digest).await {
            tracing::info!(%room, %username, "Rejected join: incorrect password");
            return Err(JoinError::IncorrectPassword);
        }

        // 2. この接続が別のユーザー名で束縛されていれば外す（そのユーザー名のロックの下で）
        if let Some((bound_name, bound_room)) = self.index.find_binding_by_connection(&connection)
            && bound_name != username
            && let Err(e) = self.leave.execute(&bound_room, &bound_name, &connection).await
        {
            tracing::warn!(room = %bound_room, username = %bound_name, error = %e, "Stale binding was already gone");
        }

        // 3. 同じユーザー名の束縛の解除・参加・束縛を、ユーザー名のロックの下で一続きに行う
        let guard = self.locks.acquire(&username).await;
        if let Some((bound_room, owner)) = self.index.find_binding_by_username(&username)
            && let Err(e) = self.leave.leave_binding(&bound_room, &username, &owner).await
        {
            tracing::warn!(room = %bound_room, %username, error = %e, "Stale binding was already gone");
        }

        let ticket = JoinTicket {
            room: room.clone(),
            username: username.clone(),
            connection: connection.clone(),
            sender,
            digest,
            initial_content,
        };
        let outcome = self
            .registry
            .join(ticket)
            .await
            .map_err(|e| match e {
                RegistryError::Room(RoomError::AuthenticationFailed) => JoinError::IncorrectPassword,
                RegistryError::Room(RoomError::AlreadyMember(_)) => JoinError::AlreadyJoined {
                    username: username.as_str().to_string(),
                    room: room.as_str().to_string(),
                },
                other => {
                    tracing::warn!(%room, %username, error = %other, "Join failed");
                    JoinError::RoomUnavailable(room.as_str().to_string())
                }
            })?;

        // 4. Session Index に束縛。外れた束縛が残っていれば、そのメンバーもルームから外す
        let (own, others): (Vec<_>, Vec<_>) = self
            .index
            .bind(username.clone(), room.clone(), connection.clone())
            .into_iter()
            .partition(|dropped| dropped.username == username);
        for dropped in &own {
            tracing::warn!(room = %dropped.room, %username, "Dropped an unexpected binding");
            if let Err(e) = self
                .leave
                .remove_member(&dropped.room, &dropped.username, &dropped.connection)
                .await
            {
                tracing::warn!(room = %dropped.room, %username, error = %e, "Stale binding was already gone");
            }
        }
        drop(guard);

        // 別のユーザー名のロックは、自分のロックを手放してから取る
        for dropped in &others {
            tracing::warn!(room = %dropped.room, username = %dropped.username, "Dropped an unexpected binding");
            if let Err(e) = self.leave.evict(dropped).await {
                tracing::warn!(room = %dropped.room, username = %dropped.username, error = %e, "Stale binding was already gone");
            }
        }

        tracing::info!(%room, %username, created = outcome.created, "Joined room");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionIdFactory, LeaveOutcome, PasswordDigest, RoomSnapshot},
        infrastructure::{
            dto::websocket::ServerEvent,
            repository::{InMemoryRoomRegistry, InMemorySessionIndex},
        },
    };
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct Client {
        connection: ConnectionId,
        tx: mpsc::UnboundedSender<String>,
        rx: mpsc::UnboundedReceiver<String>,
    }

    impl Client {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                connection: ConnectionIdFactory::generate(),
                tx,
                rx,
            }
        }

        fn command(&self, room: &str, username: &str, password: &str) -> JoinCommand {
            JoinCommand {
                room: RoomCode::new(room.to_string()).unwrap(),
                username: Username::new(username.to_string()).unwrap(),
                password: password.to_string(),
                initial_content: None,
                connection: self.connection.clone(),
                sender: self.tx.clone(),
            }
        }

        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                events.push(serde_json::from_str(&frame).unwrap());
            }
            events
        }
    }

    fn setup() -> (Arc<InMemoryRoomRegistry>, Arc<InMemorySessionIndex>, JoinRoomUseCase) {
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let index = Arc::new(InMemorySessionIndex::new());
        let usecase = JoinRoomUseCase::new(registry.clone(), index.clone(), UsernameLocks::new());
        (registry, index, usecase)
    }

    fn code(value: &str) -> RoomCode {
        RoomCode::new(value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_join_new_room_binds_session() {
        // テスト項目: 新規ルームへの参加でルームが作成され、束縛が登録される
        // given (前提条件):
        let (registry, index, usecase) = setup();
        let mut alice = Client::new();
        let mut command = alice.command("abc", "alice", "pw1");
        command.initial_content = Some("print(1)".to_string());

        // when (操作):
        let outcome = usecase.execute(command).await.unwrap();

        // then (期待する結果):
        assert!(outcome.created);
        assert_eq!(
            index.find_binding_by_connection(&alice.connection),
            Some((Username::new("alice".to_string()).unwrap(), code("abc")))
        );
        assert_eq!(registry.get_buffer(&code("abc")).await.unwrap(), "print(1)");
        assert_eq!(alice.drain().len(), 3);
    }

    #[tokio::test]
    async fn test_join_wrong_password_changes_nothing() {
        // テスト項目: パスワード不一致の join は状態を変えず、配信も行われない
        // given (前提条件):
        let (registry, index, usecase) = setup();
        let mut alice = Client::new();
        let mut carol = Client::new();
        usecase
            .execute(alice.command("abc", "alice", "pw1"))
            .await
            .unwrap();
        alice.drain();

        // when (操作): 何度誤ったパスワードで試しても
        for _ in 0..3 {
            let result = usecase.execute(carol.command("abc", "carol", "wrong")).await;
            assert_eq!(result, Err(JoinError::IncorrectPassword));
        }

        // then (期待する結果):
        assert_eq!(
            registry.snapshot(&code("abc")).await.unwrap().users,
            vec!["alice"]
        );
        assert_eq!(index.binding_count(), 1);
        assert!(alice.drain().is_empty());
        assert!(carol.drain().is_empty());
    }

    #[tokio::test]
    async fn test_join_other_room_moves_user() {
        // テスト項目: 別ルームへの参加で前のルームから外れる（残りのメンバーには userLeft が届く）
        // given (前提条件):
        let (registry, index, usecase) = setup();
        let mut alice = Client::new();
        let mut bob = Client::new();
        usecase
            .execute(alice.command("a", "alice", "pw"))
            .await
            .unwrap();
        usecase.execute(bob.command("a", "bob", "pw")).await.unwrap();
        alice.drain();
        bob.drain();

        // when (操作): alice が別の接続からルーム b に参加
        let mut alice_elsewhere = Client::new();
        usecase
            .execute(alice_elsewhere.command("b", "alice", "pw"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            bob.drain(),
            vec![ServerEvent::UserLeft {
                username: "alice".to_string(),
                users: vec!["bob".to_string()]
            }]
        );
        assert_eq!(registry.snapshot(&code("a")).await.unwrap().users, vec!["bob"]);
        assert_eq!(registry.snapshot(&code("b")).await.unwrap().users, vec!["alice"]);
        assert!(index.find_binding_by_connection(&alice.connection).is_none());
        assert_eq!(index.binding_count(), 2);
        assert_eq!(alice_elsewhere.drain()[0], ServerEvent::JoinSuccess {});
    }

    #[tokio::test]
    async fn test_join_other_room_deletes_emptied_room() {
        // テスト項目: 前のルームが空になった場合、そのルームは削除される
        // given (前提条件):
        let (registry, _index, usecase) = setup();
        let alice = Client::new();
        usecase
            .execute(alice.command("a", "alice", "pw"))
            .await
            .unwrap();

        // when (操作): 同じ接続でルーム b に参加
        usecase
            .execute(alice.command("b", "alice", "pw"))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(registry.snapshot(&code("a")).await.is_none());
        let codes: Vec<String> = registry.list().await.into_iter().map(|s| s.code).collect();
        assert_eq!(codes, vec!["b"]);
    }

    #[tokio::test]
    async fn test_rejoin_same_room_from_new_connection() {
        // テスト項目: 同じルームに別の接続から同名で参加すると、古い接続の参加が置き換わる
        // given (前提条件):
        let (registry, index, usecase) = setup();
        let old = Client::new();
        let mut bob = Client::new();
        usecase.execute(old.command("abc", "alice", "pw")).await.unwrap();
        usecase.execute(bob.command("abc", "bob", "pw")).await.unwrap();
        bob.drain();

        // when (操作):
        let new = Client::new();
        usecase.execute(new.command("abc", "alice", "pw")).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            registry.snapshot(&code("abc")).await.unwrap().users,
            vec!["bob", "alice"]
        );
        assert!(index.find_binding_by_connection(&old.connection).is_none());
        assert!(index.find_binding_by_connection(&new.connection).is_some());
        let names: Vec<&str> = bob.drain().iter().map(ServerEvent::name).collect();
        assert_eq!(names, vec!["userLeft", "userJoined"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_of_same_username_all_succeed() {
        // テスト項目: 同じユーザー名で同時に参加しても全て成功し、最後に残る参加は 1 つだけ
        // given (前提条件):
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let index = Arc::new(InMemorySessionIndex::new());
        let usecase = Arc::new(JoinRoomUseCase::new(
            registry.clone(),
            index.clone(),
            UsernameLocks::new(),
        ));
        let clients: Vec<Client> = (0..16).map(|_| Client::new()).collect();

        // when (操作): 16 本の接続が alice としてルーム a / b に同時に参加
        let tasks: Vec<_> = clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                let command = client.command(if i % 2 == 0 { "a" } else { "b" }, "alice", "pw");
                let usecase = usecase.clone();
                tokio::spawn(async move { usecase.execute(command).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // then (期待する結果): 束縛もメンバーもシステム全体で 1 つ
        assert_eq!(index.binding_count(), 1);
        let alice = Username::new("alice".to_string()).unwrap();
        let (bound_room, _) = index.find_binding_by_username(&alice).unwrap();
        let rooms = registry.list().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].code, bound_room.as_str());
        assert_eq!(rooms[0].users, vec!["alice"]);
        assert_eq!(registry.room_count(), 1);
    }

    /// 検証だけは常に通す Registry。検証と参加の間に別のパスワードでルームが作られた状況を作る
    struct StaleValidation(Arc<InMemoryRoomRegistry>);

    #[async_trait]
    impl RoomRegistry for StaleValidation {
        async fn validate(&self, _room: &RoomCode, _digest: &PasswordDigest) -> bool {
            true
        }

        async fn join(&self, ticket: JoinTicket) -> Result<JoinOutcome, RegistryError> {
            self.0.join(ticket).await
        }

        async fn change_code(
            &self,
            room: &RoomCode,
            username: &Username,
            connection: &ConnectionId,
            content: String,
        ) -> Result<(), RegistryError> {
            self.0.change_code(room, username, connection, content).await
        }

        async fn leave(
            &self,
            room: &RoomCode,
            username: &Username,
            connection: &ConnectionId,
        ) -> Result<LeaveOutcome, RegistryError> {
            self.0.leave(room, username, connection).await
        }

        async fn get_buffer(&self, room: &RoomCode) -> Result<String, RegistryError> {
            self.0.get_buffer(room).await
        }

        async fn snapshot(&self, room: &RoomCode) -> Option<RoomSnapshot> {
            self.0.snapshot(room).await
        }

        async fn list(&self) -> Vec<RoomSnapshot> {
            self.0.list().await
        }

        async fn clear(&self) {
            self.0.clear().await
        }
    }

    #[tokio::test]
    async fn test_join_losing_creation_race_reports_incorrect_password() {
        // テスト項目: 検証後に別のパスワードでルームが作られていた場合、参加は IncorrectPassword で終わり
        //             以前のルームからは外れたまま（受け入れている競合）
        // given (前提条件):
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let index = Arc::new(InMemorySessionIndex::new());
        let usecase = JoinRoomUseCase::new(
            Arc::new(StaleValidation(registry.clone())),
            index.clone(),
            UsernameLocks::new(),
        );
        let mut alice = Client::new();
        let mut carol = Client::new();
        usecase
            .execute(alice.command("a", "alice", "pw"))
            .await
            .unwrap();
        usecase
            .execute(carol.command("b", "carol", "secret"))
            .await
            .unwrap();
        alice.drain();
        carol.drain();

        // when (操作):
        let result = usecase.execute(alice.command("b", "alice", "pw")).await;

        // then (期待する結果): b には何も起きず、alice はどこにも束縛されていない
        assert_eq!(result, Err(JoinError::IncorrectPassword));
        assert!(registry.snapshot(&code("a")).await.is_none());
        assert_eq!(registry.snapshot(&code("b")).await.unwrap().users, vec!["carol"]);
        assert!(index.find_binding_by_connection(&alice.connection).is_none());
        assert_eq!(index.binding_count(), 1);
        assert!(alice.drain().is_empty());
        assert!(carol.drain().is_empty());
    }
}
