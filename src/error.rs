//! Error types for the board, the game sessions, the store and configuration.
//!
//! `GameError` is what every session operation returns. Its `code()` maps onto
//! the fixed error taxonomy clients see on the wire as `{code, message}`.

use crate::board::Position;
use crate::color::Color;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Geometry errors raised by `BoardState`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("board dimensions {width}x{height} outside allowed range {min}..={max}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        min: usize,
        max: usize,
    },

    #[error("position {position} is outside the {width}x{height} board")]
    OutOfBounds {
        position: Position,
        width: usize,
        height: usize,
    },

    #[error("cell {0} is already filled")]
    CellOccupied(Position),
}

/// Wire-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    ValidationError,
    NotFoundError,
    GameFullError,
    ColorTakenError,
    NotEnoughPlayersError,
    WrongTurnError,
    CellOccupiedError,
    GameOverError,
    PersistenceError,
}

/// Errors returned by game session and coordinator operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("game '{0}' not found")]
    NotFound(String),

    #[error("game is full ({limit} players)")]
    GameFull { limit: usize },

    #[error("color {0} is already taken")]
    ColorTaken(Color),

    #[error("need at least {need} players to start, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("it is {expected}'s turn, not {actual}'s")]
    WrongTurn { expected: Color, actual: Color },

    #[error("cell {0} is already filled")]
    CellOccupied(Position),

    #[error("game is over")]
    GameOver,

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::Validation(_) => ErrorCode::ValidationError,
            GameError::NotFound(_) => ErrorCode::NotFoundError,
            GameError::GameFull { .. } => ErrorCode::GameFullError,
            GameError::ColorTaken(_) => ErrorCode::ColorTakenError,
            GameError::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayersError,
            GameError::WrongTurn { .. } => ErrorCode::WrongTurnError,
            GameError::CellOccupied(_) => ErrorCode::CellOccupiedError,
            GameError::GameOver => ErrorCode::GameOverError,
            GameError::Persistence(_) => ErrorCode::PersistenceError,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation(msg.into())
    }
}

impl From<BoardError> for GameError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::CellOccupied(position) => GameError::CellOccupied(position),
            other => GameError::Validation(other.to_string()),
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => GameError::NotFound(name),
            StoreError::AlreadyExists(name) => {
                GameError::Validation(format!("game '{}' already exists", name))
            }
            StoreError::Validation(msg) => GameError::Validation(msg),
            other => GameError::Persistence(other.to_string()),
        }
    }
}

/// The `{code, message}` pair sent back to a client for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&GameError> for ErrorResponse {
    fn from(err: &GameError) -> Self {
        ErrorResponse {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Errors raised by a `GameStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("game '{0}' not found")]
    NotFound(String),

    #[error("game '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid game record: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_error_maps_to_game_error() {
        let occupied: GameError = BoardError::CellOccupied(Position::new(1, 2)).into();
        assert_eq!(occupied, GameError::CellOccupied(Position::new(1, 2)));
        assert_eq!(occupied.code(), ErrorCode::CellOccupiedError);

        let out: GameError = BoardError::OutOfBounds {
            position: Position::new(10, 0),
            width: 10,
            height: 10,
        }
        .into();
        assert_eq!(out.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_store_error_maps_to_game_error() {
        let missing: GameError = StoreError::NotFound("lobby".into()).into();
        assert_eq!(missing, GameError::NotFound("lobby".into()));

        let down: GameError = StoreError::Unavailable("disk full".into()).into();
        assert_eq!(down.code(), ErrorCode::PersistenceError);
    }

    #[test]
    fn test_error_response_serialization() {
        let err = GameError::WrongTurn {
            expected: Color::Red,
            actual: Color::Blue,
        };
        let response = ErrorResponse::from(&err);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], "WrongTurnError");
        assert_eq!(json["message"], "it is red's turn, not blue's");
    }
}
