//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。

pub mod change_code;
pub mod clear_rooms;
pub mod disconnect_participant;
pub mod error;
pub mod join_room;
pub mod leave_room;
pub mod session;
pub mod username_lock;

pub use change_code::ChangeCodeUseCase;
pub use clear_rooms::ClearRoomsUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ChangeCodeError, JoinError, LeaveError};
pub use join_room::{JoinCommand, JoinRoomUseCase};
pub use leave_room::LeaveRoomUseCase;
pub use session::{ConnectionSession, SessionState};
pub use username_lock::{UsernameGuard, UsernameLocks};
