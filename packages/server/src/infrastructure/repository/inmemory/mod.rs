//! インメモリ実装
//!
//! プロセス再起動をまたいだ永続化は行いません。

mod room_actor;
pub mod room_registry;
pub mod session_index;

pub use room_registry::InMemoryRoomRegistry;
pub use session_index::InMemorySessionIndex;
