//! Domain factories for creating domain entities and value objects.

use super::ConnectionId;

/// Factory for generating ConnectionId instances.
///
/// This factory encapsulates the logic for generating new connection identifiers,
/// separating the generation concern from the validation logic in ConnectionId.
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// Generate a new ConnectionId with a random UUID v4.
    pub fn generate() -> ConnectionId {
        ConnectionId::from_uuid(uuid::Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_factory_generate() {
        // テスト項目: ConnectionIdFactory::generate() で UUID v4 形式の ConnectionId を生成できる
        // when (操作):
        let connection_id = ConnectionIdFactory::generate();

        // then (期待する結果):
        assert_eq!(connection_id.as_str().len(), 36); // UUID v4 の標準長（ハイフン含む）
        assert!(ConnectionId::new(connection_id.as_str().to_string()).is_ok());
    }

    #[test]
    fn test_connection_id_factory_generate_uniqueness() {
        // テスト項目: ConnectionIdFactory::generate() は毎回異なる ID を生成する
        // when (操作):
        let id1 = ConnectionIdFactory::generate();
        let id2 = ConnectionIdFactory::generate();

        // then (期待する結果):
        assert_ne!(id1, id2);
    }
}
