pub mod game;
pub mod health;
pub mod sse;

pub use game::{
    get_hand, get_state, join_table, leave_table, send_chat, start_game, submit_action,
    ChatRequest, JoinTableRequest, LeaveTableRequest, PlayerActionRequest,
};
pub use health::health;
pub use sse::stream_events;
