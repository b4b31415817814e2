//! # Game Session - Authoritative Per-Room State
//!
//! A `GameSession` is the single source of truth for one game room: the board,
//! the seated players, and the winner. Every mutation is validated here before
//! it touches the board.
//!
//! ## Lifecycle
//! ```text
//!  Created ──join──► Joinable ──start──► Started ──winning move──► Over
//!     ▲                 │
//!     └──last leave─────┘
//! ```
//!
//! Whose turn it is is never stored. It is derived from the color of the most
//! recently placed marble every time it is needed, so it cannot drift out of
//! sync with the board.

use crate::board::{BoardLimits, BoardState, Cell, Position};
use crate::color::Color;
use crate::detector::{DetectorConfig, PotentialQuintroDelta, PotentialQuintroSet, QuintroDetector};
use crate::error::GameError;
use crate::line::Quintro;
use crate::store::{BoardRecord, FilledCell, GameRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque reference to an authenticated user, supplied by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub String);

impl UserRef {
    pub fn new(user: impl Into<String>) -> Self {
        UserRef(user.into())
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_active() -> bool {
    true
}

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub color: Color,
    pub user_ref: UserRef,
    /// Join sequence number. Never renumbered when others leave.
    #[serde(default)]
    pub order: usize,
    /// False once the player has left a started game.
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// No players yet.
    Created,
    /// Accepting players.
    Joinable,
    /// Marbles are being placed.
    Started,
    /// Someone won or the board filled up.
    Over,
}

/// Rules shared by every session a coordinator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRules {
    pub min_players_to_start: usize,
    pub board_limits: BoardLimits,
    pub detector: DetectorConfig,
}

impl Default for SessionRules {
    fn default() -> Self {
        SessionRules {
            min_players_to_start: 3,
            board_limits: BoardLimits::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Result of a successful `join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub player: Player,
    /// True when the user already held this seat.
    pub rejoined: bool,
}

/// Result of a successful `place_marble`.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub cell: Cell,
    pub color: Color,
    /// Completed lines through the new marble. Non-empty means a win.
    pub quintros: Vec<Quintro>,
    pub delta: PotentialQuintroDelta,
    pub winner: Option<Color>,
    /// Whose turn it is now; `None` once the game is over.
    pub next_turn: Option<Color>,
    pub move_number: usize,
}

impl MoveOutcome {
    pub fn is_game_over(&self) -> bool {
        self.next_turn.is_none()
    }
}

/// One game room's state.
#[derive(Debug, Clone)]
pub struct GameSession {
    name: String,
    board: BoardState,
    players: Vec<Player>,
    player_limit: usize,
    winner: Option<Color>,
    is_started: bool,
    presence: BTreeMap<Color, bool>,
    potentials: PotentialQuintroSet,
    next_order: usize,
    rules: SessionRules,
}

fn validate_player_limit(player_limit: usize, rules: &SessionRules) -> Result<(), GameError> {
    if player_limit > Color::PALETTE.len() {
        return Err(GameError::validation(format!(
            "player limit {} exceeds the {} available colors",
            player_limit,
            Color::PALETTE.len()
        )));
    }
    if player_limit < rules.min_players_to_start.max(1) {
        return Err(GameError::validation(format!(
            "player limit {} is below the {} players needed to start",
            player_limit, rules.min_players_to_start
        )));
    }
    Ok(())
}

impl GameSession {
    /// Creates an empty game after validating its parameters.
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        player_limit: usize,
        rules: SessionRules,
    ) -> Result<Self, GameError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GameError::validation("game name must not be empty"));
        }
        validate_player_limit(player_limit, &rules)?;
        let board = BoardState::new(width, height, &rules.board_limits)?;
        let potentials = PotentialQuintroSet::from_board(&board, rules.detector);
        Ok(GameSession {
            name,
            board,
            players: Vec::new(),
            player_limit,
            winner: None,
            is_started: false,
            presence: BTreeMap::new(),
            potentials,
            next_order: 0,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_limit(&self) -> usize {
        self.player_limit
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn potential_quintros(&self) -> &PotentialQuintroSet {
        &self.potentials
    }

    pub fn phase(&self) -> SessionPhase {
        if self.winner.is_some() || (self.is_started && self.board.is_full()) {
            SessionPhase::Over
        } else if self.is_started {
            SessionPhase::Started
        } else if self.players.is_empty() {
            SessionPhase::Created
        } else {
            SessionPhase::Joinable
        }
    }

    pub fn is_over(&self) -> bool {
        self.phase() == SessionPhase::Over
    }

    /// The active seat held by `user`, if any.
    pub fn player_for(&self, user: &UserRef) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.active && &p.user_ref == user)
    }

    pub fn player_by_color(&self, color: Color) -> Option<&Player> {
        self.players.iter().find(|p| p.color == color)
    }

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    /// Seats `user`, preferring `requested` when it is still free.
    pub fn join(&mut self, user: UserRef, requested: Option<Color>) -> Result<JoinOutcome, GameError> {
        if let Some(existing) = self.player_for(&user) {
            return Ok(JoinOutcome {
                player: existing.clone(),
                rejoined: true,
            });
        }
        match self.phase() {
            SessionPhase::Over => return Err(GameError::GameOver),
            SessionPhase::Started => {
                return Err(GameError::validation("game has already started"))
            }
            SessionPhase::Created | SessionPhase::Joinable => {}
        }
        if self.players.len() >= self.player_limit {
            return Err(GameError::GameFull {
                limit: self.player_limit,
            });
        }

        let taken = |color: Color| self.players.iter().any(|p| p.color == color);
        let color = match requested {
            Some(color) if taken(color) => return Err(GameError::ColorTaken(color)),
            Some(color) => color,
            None => Color::PALETTE
                .iter()
                .copied()
                .find(|&c| !taken(c))
                .ok_or(GameError::GameFull {
                    limit: self.player_limit,
                })?,
        };

        let player = Player {
            color,
            user_ref: user,
            order: self.next_order,
            active: true,
        };
        self.next_order += 1;
        self.players.push(player.clone());
        Ok(JoinOutcome {
            player,
            rejoined: false,
        })
    }

    /// Gives up `user`'s seat. Before the start the color is freed; after it
    /// the seat stays in place, inactive, so turn order does not shift.
    pub fn leave(&mut self, user: &UserRef) -> Result<Player, GameError> {
        match self.phase() {
            SessionPhase::Over => return Err(GameError::GameOver),
            SessionPhase::Created => {
                return Err(GameError::validation(format!("{} is not in this game", user)))
            }
            SessionPhase::Joinable | SessionPhase::Started => {}
        }
        let idx = self
            .players
            .iter()
            .position(|p| p.active && &p.user_ref == user)
            .ok_or_else(|| GameError::validation(format!("{} is not in this game", user)))?;

        if self.is_started {
            self.players[idx].active = false;
            self.presence.insert(self.players[idx].color, false);
            Ok(self.players[idx].clone())
        } else {
            let player = self.players.remove(idx);
            self.presence.remove(&player.color);
            Ok(player)
        }
    }

    /// Moves from Joinable to Started.
    pub fn start(&mut self) -> Result<(), GameError> {
        match self.phase() {
            SessionPhase::Over => return Err(GameError::GameOver),
            SessionPhase::Started => return Err(GameError::validation("game has already started")),
            SessionPhase::Created | SessionPhase::Joinable => {}
        }
        let need = self.rules.min_players_to_start;
        let have = self.active_count();
        if have < need {
            return Err(GameError::NotEnoughPlayers { have, need });
        }
        self.is_started = true;
        Ok(())
    }

    /// Color of the next active player after the one who moved last, walking
    /// the seats in join order. The first active seat opens the game.
    fn turn_color(&self) -> Option<Color> {
        let n = self.players.len();
        let first_active = || self.players.iter().find(|p| p.active).map(|p| p.color);
        let Some(last) = self.board.last_filled() else {
            return first_active();
        };
        let Some(idx) = self.players.iter().position(|p| Some(p.color) == last.color) else {
            return first_active();
        };
        (1..=n)
            .map(|k| &self.players[(idx + k) % n])
            .find(|p| p.active)
            .map(|p| p.color)
    }

    /// Whose turn it is, or `None` outside the Started phase.
    pub fn current_turn(&self) -> Option<Color> {
        if self.phase() != SessionPhase::Started {
            return None;
        }
        self.turn_color()
    }

    /// Validates and applies one move, then checks for a win.
    pub fn place_marble(&mut self, user: &UserRef, position: Position) -> Result<MoveOutcome, GameError> {
        match self.phase() {
            SessionPhase::Over => return Err(GameError::GameOver),
            SessionPhase::Created | SessionPhase::Joinable => {
                return Err(GameError::validation("game has not started"))
            }
            SessionPhase::Started => {}
        }
        let color = self
            .player_for(user)
            .map(|p| p.color)
            .ok_or_else(|| GameError::validation(format!("{} is not playing in this game", user)))?;

        if self.board.get_cell(position)?.is_filled() {
            return Err(GameError::CellOccupied(position));
        }
        let expected = self
            .turn_color()
            .ok_or_else(|| GameError::validation("no active players remain"))?;
        if color != expected {
            return Err(GameError::WrongTurn {
                expected,
                actual: color,
            });
        }

        let delta = QuintroDetector::new(&self.board, self.rules.detector)
            .potential_quintro_delta(position, color)?;
        let cell = self.board.fill_cell(position, color)?;
        self.potentials.apply(&delta);

        let quintros = QuintroDetector::new(&self.board, self.rules.detector).quintros(position)?;
        if !quintros.is_empty() {
            self.winner = Some(color);
        }

        Ok(MoveOutcome {
            cell,
            color,
            quintros,
            delta,
            winner: self.winner,
            next_turn: self.current_turn(),
            move_number: self.board.move_count(),
        })
    }

    /// Records whether the seat holding `color` has a live connection.
    pub fn set_presence(&mut self, color: Color, connected: bool) {
        if self.player_by_color(color).is_some() {
            self.presence.insert(color, connected);
        }
    }

    /// Connection state of every seat.
    pub fn presence(&self) -> BTreeMap<Color, bool> {
        self.players
            .iter()
            .map(|p| (p.color, p.active && self.presence.get(&p.color).copied().unwrap_or(false)))
            .collect()
    }

    /// Snapshot in the persisted layout.
    pub fn to_record(&self) -> GameRecord {
        GameRecord {
            name: self.name.clone(),
            board: BoardRecord {
                width: self.board.width(),
                height: self.board.height(),
                filled_cells: self
                    .board
                    .filled_cells()
                    .filter_map(|cell| {
                        cell.color.map(|color| FilledCell {
                            position: cell.position,
                            color,
                        })
                    })
                    .collect(),
            },
            players: self.players.clone(),
            player_limit: self.player_limit,
            is_started: self.is_started,
            winner: self.winner,
        }
    }

    /// Rebuilds a session from a persisted record, replaying its moves.
    pub fn from_record(record: &GameRecord, rules: SessionRules) -> Result<Self, GameError> {
        let mut session = GameSession::new(
            record.name.clone(),
            record.board.width,
            record.board.height,
            record.player_limit,
            rules,
        )?;
        for player in &record.players {
            if session.players.iter().any(|p| p.color == player.color) {
                return Err(GameError::validation(format!(
                    "color {} is assigned twice in '{}'",
                    player.color, record.name
                )));
            }
            session.players.push(player.clone());
        }
        session.next_order = session
            .players
            .iter()
            .map(|p| p.order + 1)
            .max()
            .unwrap_or(0);
        for filled in &record.board.filled_cells {
            session.board.fill_cell(filled.position, filled.color)?;
        }
        session.is_started = record.is_started;
        session.winner = record.winner;
        session.potentials = PotentialQuintroSet::from_board(&session.board, rules.detector);
        Ok(session)
    }
}
