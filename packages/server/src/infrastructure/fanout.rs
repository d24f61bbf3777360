//! Per-room fan-out of server events to member connections.

use std::collections::HashMap;

use crate::{
    domain::{ConnectionId, OutboundSender, RoomCode},
    infrastructure::dto::websocket::ServerEvent,
};

/// Outbound channels of every connection currently joined to one room.
///
/// Delivery is at-most-once per recipient. A recipient whose channel already
/// closed is skipped silently; removing it is the leave path's job.
pub struct RoomFanout {
    room: RoomCode,
    subscribers: HashMap<ConnectionId, OutboundSender>,
}

impl RoomFanout {
    pub fn new(room: RoomCode) -> Self {
        Self {
            room,
            subscribers: HashMap::new(),
        }
    }

    /// Attach a connection's outbound channel to the room
    pub fn subscribe(&mut self, connection: ConnectionId, sender: OutboundSender) {
        self.subscribers.insert(connection, sender);
    }

    /// Detach a connection; returns false if it was not attached
    pub fn unsubscribe(&mut self, connection: &ConnectionId) -> bool {
        self.subscribers.remove(connection).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send an event to a single attached connection
    pub fn send_to(&self, connection: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(sender) = self.subscribers.get(connection) else {
            tracing::debug!(
                room = %self.room,
                connection = %connection,
                event = event.name(),
                "Recipient is not attached to the room"
            );
            return false;
        };
        match event.to_frame() {
            Ok(frame) => deliver(sender, frame, &self.room, connection, event.name()),
            Err(e) => {
                tracing::error!(room = %self.room, event = event.name(), error = %e, "Failed to serialize event");
                false
            }
        }
    }

    /// Send an event to every attached connection, optionally skipping one.
    ///
    /// The event is serialized once. Returns the number of channels that accepted it.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<&ConnectionId>) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(room = %self.room, event = event.name(), error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let delivered = self
            .subscribers
            .iter()
            .filter(|(connection, _)| Some(*connection) != exclude)
            .filter(|(connection, sender)| {
                deliver(sender, frame.clone(), &self.room, connection, event.name())
            })
            .count();

        tracing::debug!(room = %self.room, event = event.name(), delivered, "Broadcast");
        delivered
    }
}

fn deliver(
    sender: &OutboundSender,
    frame: String,
    room: &RoomCode,
    connection: &ConnectionId,
    event: &str,
) -> bool {
    if sender.send(frame).is_err() {
        tracing::debug!(%room, %connection, event, "Dropped event for closed connection");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionIdFactory;
    use tokio::sync::mpsc;

    fn fanout() -> RoomFanout {
        RoomFanout::new(RoomCode::new("abc".to_string()).unwrap())
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> ServerEvent {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        // テスト項目: ブロードキャストは全ての購読者に届く
        // given (前提条件):
        let mut fanout = fanout();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.subscribe(ConnectionIdFactory::generate(), tx1);
        fanout.subscribe(ConnectionIdFactory::generate(), tx2);
        let event = ServerEvent::CodeUpdate {
            code: "print(2)".to_string(),
            username: "bob".to_string(),
        };

        // when (操作):
        let delivered = fanout.broadcast(&event, None);

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(next_event(&mut rx1), event);
        assert_eq!(next_event(&mut rx2), event);
    }

    #[test]
    fn test_broadcast_excludes_connection() {
        // テスト項目: 除外指定した接続にはブロードキャストされない
        // given (前提条件):
        let mut fanout = fanout();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let sender_id = ConnectionIdFactory::generate();
        fanout.subscribe(sender_id.clone(), tx1);
        fanout.subscribe(ConnectionIdFactory::generate(), tx2);

        // when (操作):
        let delivered = fanout.broadcast(&ServerEvent::JoinSuccess {}, Some(&sender_id));

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(next_event(&mut rx2), ServerEvent::JoinSuccess {});
    }

    #[test]
    fn test_broadcast_skips_closed_channel() {
        // テスト項目: 既に閉じた接続への配送は黙って破棄され、他の配送に影響しない
        // given (前提条件):
        let mut fanout = fanout();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.subscribe(ConnectionIdFactory::generate(), tx1);
        fanout.subscribe(ConnectionIdFactory::generate(), tx2);
        drop(rx1);

        // when (操作):
        let delivered = fanout.broadcast(&ServerEvent::JoinSuccess {}, None);

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert_eq!(next_event(&mut rx2), ServerEvent::JoinSuccess {});
    }

    #[test]
    fn test_send_to_and_unsubscribe() {
        // テスト項目: send_to は指定の接続のみに届き、購読解除後は届かない
        // given (前提条件):
        let mut fanout = fanout();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ConnectionIdFactory::generate();
        fanout.subscribe(connection.clone(), tx);

        // when (操作):
        let first = fanout.send_to(&connection, &ServerEvent::JoinSuccess {});
        let removed = fanout.unsubscribe(&connection);
        let second = fanout.send_to(&connection, &ServerEvent::JoinSuccess {});

        // then (期待する結果):
        assert!(first);
        assert!(removed);
        assert!(!second);
        assert_eq!(fanout.subscriber_count(), 0);
        assert_eq!(next_event(&mut rx), ServerEvent::JoinSuccess {});
        assert!(rx.try_recv().is_err());
    }
}
