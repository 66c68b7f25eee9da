mod action_id;
mod connection_id;
mod drawing_id;
mod player_id;
mod room_id;
mod session_id;

pub use action_id::ActionId;
pub use connection_id::ConnectionId;
pub use drawing_id::DrawingId;
pub use player_id::PlayerId;
pub use room_id::RoomId;
pub use session_id::SessionId;
