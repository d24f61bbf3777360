//! Core domain models for the collaborative room relay.

use serde::{Deserialize, Serialize};

use super::{
    credential::PasswordDigest,
    error::RoomError,
    value_object::{ConnectionId, RoomCode, Timestamp, Username},
};

/// A shared editing room: one text buffer, a membership set and a sealed password digest.
///
/// The digest is fixed at creation and never changes. The buffer is replaced
/// wholesale by every accepted edit (last writer wins).
#[derive(Debug, Clone)]
pub struct Room {
    /// Room code
    pub code: RoomCode,
    /// Current members in join order, unique by username
    pub members: Vec<Member>,
    /// Timestamp when the room was created
    pub created_at: Timestamp,
    buffer: String,
    password_digest: PasswordDigest,
}

impl Room {
    /// Create a new empty room sealed with the creator's password digest
    pub fn new(
        code: RoomCode,
        initial_content: String,
        password_digest: PasswordDigest,
        created_at: Timestamp,
    ) -> Self {
        Self {
            code,
            members: Vec::new(),
            created_at,
            buffer: initial_content,
            password_digest,
        }
    }

    /// Check a join attempt's digest against the sealed one
    pub fn validate(&self, digest: &PasswordDigest) -> bool {
        &self.password_digest == digest
    }

    /// Add a member to the room
    ///
    /// # Errors
    ///
    /// Returns `RoomError::AlreadyMember` if the username is already present
    pub fn add_member(&mut self, member: Member) -> Result<(), RoomError> {
        if self.get_member(&member.username).is_some() {
            return Err(RoomError::AlreadyMember(member.username.into_string()));
        }
        self.members.push(member);
        Ok(())
    }

    /// Remove the member bound to `connection`, returning how many members remain
    ///
    /// # Errors
    ///
    /// Returns `RoomError::NotAMember` if the username is absent or is held by another connection
    pub fn remove_member(
        &mut self,
        username: &Username,
        connection: &ConnectionId,
    ) -> Result<usize, RoomError> {
        let position = self
            .members
            .iter()
            .position(|m| &m.username == username && &m.connection == connection)
            .ok_or_else(|| RoomError::NotAMember(username.as_str().to_string()))?;
        self.members.remove(position);
        Ok(self.members.len())
    }

    /// Get a member by username
    pub fn get_member(&self, username: &Username) -> Option<&Member> {
        self.members.iter().find(|m| &m.username == username)
    }

    /// Whether `username` is a member through `connection`
    pub fn is_member_on(&self, username: &Username, connection: &ConnectionId) -> bool {
        self.get_member(username)
            .is_some_and(|m| &m.connection == connection)
    }

    /// Replace the whole buffer
    pub fn set_buffer(&mut self, content: String) {
        self.buffer = content;
    }

    /// Current buffer content
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Usernames in join order, as sent in presence events
    pub fn usernames(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.username.as_str().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Public view of the room; never includes the digest or the buffer
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.as_str().to_string(),
            users: self.usernames(),
            created_at: self.created_at,
        }
    }
}

/// A username's membership in a room through one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: Username,
    pub connection: ConnectionId,
    /// Timestamp when the member joined
    pub joined_at: Timestamp,
}

impl Member {
    /// Create a new member
    pub fn new(username: Username, connection: ConnectionId, joined_at: Timestamp) -> Self {
        Self {
            username,
            connection,
            joined_at,
        }
    }
}

/// Read-only summary of a live room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub users: Vec<String>,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionIdFactory, credential::digest};

    fn room_abc() -> Room {
        Room::new(
            RoomCode::new("abc".to_string()).unwrap(),
            "print(1)".to_string(),
            digest("pw1"),
            Timestamp::new(1000),
        )
    }

    fn member(name: &str) -> Member {
        Member::new(
            Username::new(name.to_string()).unwrap(),
            ConnectionIdFactory::generate(),
            Timestamp::new(2000),
        )
    }

    #[test]
    fn test_room_new() {
        // テスト項目: 新しい Room はメンバーなし・初期内容ありで作成される
        // when (操作):
        let room = room_abc();

        // then (期待する結果):
        assert_eq!(room.code.as_str(), "abc");
        assert!(room.is_empty());
        assert_eq!(room.buffer(), "print(1)");
        assert_eq!(room.created_at, Timestamp::new(1000));
    }

    #[test]
    fn test_room_validate_digest() {
        // テスト項目: 作成時のパスワードのダイジェストのみ検証を通過する
        // given (前提条件):
        let room = room_abc();

        // then (期待する結果):
        assert!(room.validate(&digest("pw1")));
        assert!(!room.validate(&digest("wrong")));
    }

    #[test]
    fn test_room_add_member() {
        // テスト項目: メンバーを追加でき、参加順に並ぶ
        // given (前提条件):
        let mut room = room_abc();

        // when (操作):
        room.add_member(member("alice")).unwrap();
        room.add_member(member("bob")).unwrap();

        // then (期待する結果):
        assert_eq!(room.usernames(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_room_add_duplicate_member_fails() {
        // テスト項目: 同じユーザー名を二重に追加するとエラーになり、メンバーは変わらない
        // given (前提条件):
        let mut room = room_abc();
        room.add_member(member("alice")).unwrap();

        // when (操作):
        let result = room.add_member(member("alice"));

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::AlreadyMember("alice".to_string())));
        assert_eq!(room.members.len(), 1);
    }

    #[test]
    fn test_room_remove_member_returns_remaining() {
        // テスト項目: メンバー削除後の残り人数が返される
        // given (前提条件):
        let mut room = room_abc();
        let alice = member("alice");
        room.add_member(alice.clone()).unwrap();
        room.add_member(member("bob")).unwrap();

        // when (操作):
        let remaining = room.remove_member(&alice.username, &alice.connection);

        // then (期待する結果):
        assert_eq!(remaining, Ok(1));
        assert_eq!(room.usernames(), vec!["bob"]);
    }

    #[test]
    fn test_room_remove_member_from_other_connection_fails() {
        // テスト項目: 別の接続からのメンバー削除は拒否される（古い接続による誤削除の防止）
        // given (前提条件):
        let mut room = room_abc();
        let alice = member("alice");
        room.add_member(alice.clone()).unwrap();

        // when (操作):
        let result = room.remove_member(&alice.username, &ConnectionIdFactory::generate());

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::NotAMember("alice".to_string())));
        assert!(room.is_member_on(&alice.username, &alice.connection));
    }

    #[test]
    fn test_room_set_buffer_replaces_content() {
        // テスト項目: バッファは丸ごと置き換えられる
        // given (前提条件):
        let mut room = room_abc();

        // when (操作):
        room.set_buffer("print(2)".to_string());

        // then (期待する結果):
        assert_eq!(room.buffer(), "print(2)");
    }

    #[test]
    fn test_room_snapshot_excludes_secrets() {
        // テスト項目: スナップショットにはコード・メンバー・作成時刻のみが含まれる
        // given (前提条件):
        let mut room = room_abc();
        room.add_member(member("alice")).unwrap();

        // when (操作):
        let snapshot = room.snapshot();

        // then (期待する結果):
        assert_eq!(
            snapshot,
            RoomSnapshot {
                code: "abc".to_string(),
                users: vec!["alice".to_string()],
                created_at: Timestamp::new(1000),
            }
        );
    }
}
