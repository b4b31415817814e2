//! # Quintro Arena
//!
//! Game server for Quintro, a five-in-a-row game for three to six players on a
//! rectangular board. Players take turns placing a marble of their color; the
//! first to line up five of them horizontally, vertically or diagonally wins.
//!
//! ## Layers
//! - [`board`] and [`line`]: the grid, positions and line segments
//! - [`detector`]: potential quintro detection and incremental maintenance
//! - [`session`]: the rules of one game room
//! - [`coordinator`]: concurrent rooms, room events, persistence hand-off
//! - [`store`]: the persistence seam and its implementations
//! - [`server`]: newline-delimited JSON over TCP
//!
//! ## Usage
//! ```no_run
//! use quintro::{AppConfig, MemoryGameStore, NewGame, SessionCoordinator, UserRef};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), quintro::GameError> {
//! let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
//! coordinator
//!     .create_game(NewGame { name: "lobby".into(), width: 10, height: 10, player_limit: 3 })
//!     .await?;
//! let client = coordinator.connect();
//! coordinator.join(client.id(), "lobby", UserRef::new("ann"), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod events;
pub mod line;
pub mod server;
pub mod session;
pub mod store;

pub use board::{BoardLimits, BoardState, Cell, Position};
pub use color::Color;
pub use config::AppConfig;
pub use coordinator::{ClientHandle, ClientId, JoinAck, MoveAck, SessionCoordinator};
pub use detector::{DetectorConfig, PotentialQuintroDelta, PotentialQuintroSet, QuintroDetector};
pub use error::{BoardError, ErrorCode, ErrorResponse, GameError, StoreError};
pub use events::RoomEvent;
pub use line::{Axis, Quintro, QuintroKey, QUINTRO_LENGTH};
pub use session::{GameSession, Player, SessionPhase, SessionRules, UserRef};
pub use store::{GameRecord, GameStore, JsonDirStore, MemoryGameStore, NewGame};
