//! Authoritative game state and rules

pub mod combat;
pub mod lag;
pub mod lifecycle;
pub mod player;
pub mod scoreboard;
pub mod session;
pub mod snapshot;
pub mod spawn;

pub use player::{PlayerState, PlayerStore};
pub use session::{GameSession, Outbound, Recipient, SessionHandle};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Input forwarded from a connection to the session task
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub event: InputEvent,
    pub received_at: u64,
}

/// What happened on a connection
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Socket upgraded; the player exists as a bare placeholder
    Connect,
    /// A parsed and validated client message
    Message(ClientMsg),
    /// Socket closed or errored
    Disconnect,
}

impl PlayerInput {
    pub fn new(player_id: Uuid, event: InputEvent, received_at: u64) -> Self {
        Self {
            player_id,
            event,
            received_at,
        }
    }
}
