//! Room events broadcast to everyone watching a game.

use crate::board::Position;
use crate::color::Color;
use crate::session::Player;
use serde::{Deserialize, Serialize};

/// Everything a room can announce. Serialized as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    #[serde(rename = "player:joined")]
    PlayerJoined { game_name: String, player: Player },

    #[serde(rename = "player:left")]
    PlayerLeft { game_name: String, player: Player },

    #[serde(rename = "game:started")]
    GameStarted { game_name: String },

    #[serde(rename = "marble:placed")]
    MarblePlaced {
        game_name: String,
        position: Position,
        color: Color,
    },

    /// Whose turn it is now.
    #[serde(rename = "player:changed")]
    PlayerChanged { game_name: String, color: Color },

    /// `winner` is absent when the board filled up without a quintro.
    #[serde(rename = "game:over")]
    GameOver {
        game_name: String,
        winner: Option<Color>,
    },
}

impl RoomEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::PlayerJoined { .. } => "player:joined",
            RoomEvent::PlayerLeft { .. } => "player:left",
            RoomEvent::GameStarted { .. } => "game:started",
            RoomEvent::MarblePlaced { .. } => "marble:placed",
            RoomEvent::PlayerChanged { .. } => "player:changed",
            RoomEvent::GameOver { .. } => "game:over",
        }
    }

    pub fn game_name(&self) -> &str {
        match self {
            RoomEvent::PlayerJoined { game_name, .. }
            | RoomEvent::PlayerLeft { game_name, .. }
            | RoomEvent::GameStarted { game_name }
            | RoomEvent::MarblePlaced { game_name, .. }
            | RoomEvent::PlayerChanged { game_name, .. }
            | RoomEvent::GameOver { game_name, .. } => game_name,
        }
    }
}
