//! ルーム単位のアクター
//!
//! 1 つのルームの状態（メンバー・バッファ・パスワードダイジェスト）と配信先を
//! 1 つの tokio タスクが専有し、コマンドチャネルから 1 件ずつ処理します。
//! 状態の変更とそれに対応するブロードキャストは同じコマンドの処理内で完結するため、
//! 同一ルーム内の配信順序は変更順序と一致します。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use syncroom_shared::time::get_utc_timestamp;
use tokio::sync::{mpsc, oneshot};

use crate::{
    domain::{
        ConnectionId, JoinOutcome, LeaveOutcome, Member, OutboundSender, PasswordDigest,
        RegistryError, Room, RoomCode, RoomError, RoomSnapshot, Timestamp, Username,
    },
    infrastructure::{dto::websocket::ServerEvent, fanout::RoomFanout},
};

/// ルームコード → アクターハンドルの表
pub(crate) type RoomTable = Arc<Mutex<HashMap<RoomCode, RoomHandle>>>;

type Reply<T> = oneshot::Sender<T>;

/// アクターへのコマンド
pub(crate) enum RoomCommand {
    Validate {
        digest: PasswordDigest,
        reply: Reply<bool>,
    },
    Join {
        username: Username,
        connection: ConnectionId,
        sender: OutboundSender,
        digest: PasswordDigest,
        reply: Reply<Result<JoinOutcome, RegistryError>>,
    },
    ChangeCode {
        username: Username,
        connection: ConnectionId,
        content: String,
        reply: Reply<Result<(), RegistryError>>,
    },
    Leave {
        username: Username,
        connection: ConnectionId,
        reply: Reply<Result<LeaveOutcome, RegistryError>>,
    },
    GetBuffer {
        reply: Reply<Result<String, RegistryError>>,
    },
    Snapshot {
        reply: Reply<Option<RoomSnapshot>>,
    },
    Shutdown,
}

impl RoomCommand {
    /// 引退済みのアクターに届いたコマンドへの応答
    fn reject(self, room: &RoomCode) {
        let gone = || RegistryError::Retired(room.as_str().to_string());
        // 応答先が既にいない場合は無視してよい
        match self {
            Self::Validate { reply, .. } => {
                // 削除済みのルームにはどのパスワードでも参加できる
                let _ = reply.send(true);
            }
            Self::Join { reply, .. } => {
                let _ = reply.send(Err(gone()));
            }
            Self::ChangeCode { reply, .. } => {
                let _ = reply.send(Err(gone()));
            }
            Self::Leave { reply, .. } => {
                let _ = reply.send(Err(gone()));
            }
            Self::GetBuffer { reply } => {
                let _ = reply.send(Err(gone()));
            }
            Self::Snapshot { reply } => {
                let _ = reply.send(None);
            }
            Self::Shutdown => {}
        }
    }
}

/// アクターへの送信口。クローンしても同じアクターを指す
#[derive(Clone, Debug)]
pub(crate) struct RoomHandle {
    id: u64,
    room: RoomCode,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// コマンドを送り、応答を待つ
    ///
    /// アクターが既に受付を終了していれば `RegistryError::Retired` を返す
    pub(crate) async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| RegistryError::Retired(self.room.as_str().to_string()))?;
        response
            .await
            .map_err(|_| RegistryError::Retired(self.room.as_str().to_string()))
    }

    pub(crate) fn shutdown(&self) {
        // 既に停止しているなら何もしなくてよい
        let _ = self.tx.send(RoomCommand::Shutdown);
    }
}

/// ルーム 1 つ分の状態を専有するアクター
pub(crate) struct RoomActor {
    id: u64,
    room: Room,
    fanout: RoomFanout,
    table: RoomTable,
    retired: bool,
}

impl RoomActor {
    /// アクターを起動してハンドルを返す
    ///
    /// 呼び出し側は `table` のロックを保持したまま、返されたハンドルを表に登録すること
    pub(crate) fn spawn(
        id: u64,
        code: RoomCode,
        initial_content: String,
        digest: PasswordDigest,
        table: RoomTable,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Self {
            id,
            room: Room::new(
                code.clone(),
                initial_content,
                digest,
                Timestamp::new(get_utc_timestamp()),
            ),
            fanout: RoomFanout::new(code.clone()),
            table,
            retired: false,
        };
        tokio::spawn(actor.run(rx));
        RoomHandle { id, room: code, tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        tracing::debug!(room = %self.room.code, actor = self.id, "Room actor started");

        while let Some(command) = rx.recv().await {
            self.handle(command);
            if self.retired {
                break;
            }
        }

        // 受付を閉じ、既に積まれているコマンドには引退済みとして応答する
        rx.close();
        while let Some(command) = rx.recv().await {
            command.reject(&self.room.code);
        }

        tracing::debug!(room = %self.room.code, actor = self.id, "Room actor stopped");
    }

    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Validate { digest, reply } => {
                let _ = reply.send(self.room.validate(&digest));
            }
            RoomCommand::Join {
                username,
                connection,
                sender,
                digest,
                reply,
            } => {
                let result = self.join(username, connection, sender, &digest);
                let _ = reply.send(result);
            }
            RoomCommand::ChangeCode {
                username,
                connection,
                content,
                reply,
            } => {
                let result = self.change_code(&username, &connection, content);
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                username,
                connection,
                reply,
            } => {
                let result = self.leave(&username, &connection);
                let _ = reply.send(result);
            }
            RoomCommand::GetBuffer { reply } => {
                let _ = reply.send(Ok(self.room.buffer().to_string()));
            }
            RoomCommand::Snapshot { reply } => {
                // 作成直後でまだ誰も参加していないルームは存在しないものとして扱う
                let snapshot = (!self.room.is_empty()).then(|| self.room.snapshot());
                let _ = reply.send(snapshot);
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.room.code, "Room shut down");
                self.retired = true;
            }
        }
    }

    fn join(
        &mut self,
        username: Username,
        connection: ConnectionId,
        sender: OutboundSender,
        digest: &PasswordDigest,
    ) -> Result<JoinOutcome, RegistryError> {
        if !self.room.validate(digest) {
            return Err(RoomError::AuthenticationFailed.into());
        }

        // 同じユーザー名の古い参加は新しい参加で置き換える（古い接続の束縛は Index 側で外れる）
        if let Some(previous) = self.room.get_member(&username).map(|m| m.connection.clone()) {
            tracing::warn!(room = %self.room.code, %username, "Replaced an earlier join of the same username");
            let remaining = self.room.remove_member(&username, &previous)?;
            self.fanout.unsubscribe(&previous);
            if remaining > 0 {
                self.fanout.broadcast(
                    &ServerEvent::UserLeft {
                        username: username.as_str().to_string(),
                        users: self.room.usernames(),
                    },
                    None,
                );
            }
        }

        let member = Member::new(
            username.clone(),
            connection.clone(),
            Timestamp::new(get_utc_timestamp()),
        );
        if let Err(e) = self.room.add_member(member) {
            tracing::error!(room = %self.room.code, %username, error = %e, "Aborted join");
            return Err(e.into());
        }
        self.fanout.subscribe(connection.clone(), sender);

        // 参加通知 → 初期内容 → 参加者一覧の順に届ける
        self.fanout.send_to(&connection, &ServerEvent::JoinSuccess {});
        self.fanout.send_to(
            &connection,
            &ServerEvent::InitialCode {
                code: self.room.buffer().to_string(),
            },
        );
        let users = self.room.usernames();
        self.fanout.broadcast(
            &ServerEvent::UserJoined {
                username: username.into_string(),
                users: users.clone(),
            },
            None,
        );

        Ok(JoinOutcome {
            created: false,
            users,
        })
    }

    fn change_code(
        &mut self,
        username: &Username,
        connection: &ConnectionId,
        content: String,
    ) -> Result<(), RegistryError> {
        if !self.room.is_member_on(username, connection) {
            return Err(RoomError::NotAMember(username.as_str().to_string()).into());
        }

        self.room.set_buffer(content.clone());
        self.fanout.broadcast(
            &ServerEvent::CodeUpdate {
                code: content,
                username: username.as_str().to_string(),
            },
            None,
        );
        Ok(())
    }

    fn leave(
        &mut self,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<LeaveOutcome, RegistryError> {
        let remaining = self.room.remove_member(username, connection)?;
        self.fanout.unsubscribe(connection);

        if remaining == 0 {
            tracing::info!(room = %self.room.code, "Room deleted");
            self.retire();
        } else {
            self.fanout.broadcast(
                &ServerEvent::UserLeft {
                    username: username.as_str().to_string(),
                    users: self.room.usernames(),
                },
                None,
            );
        }

        Ok(LeaveOutcome { remaining })
    }

    /// 表から自分を外す。同じコードで別のアクターが登録済みならそちらは残す
    fn retire(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.get(&self.room.code).is_some_and(|h| h.id() == self.id) {
            table.remove(&self.room.code);
        }
        self.retired = true;
    }
}
