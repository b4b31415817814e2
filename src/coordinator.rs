//! # Session Coordinator - Concurrent Room Management
//!
//! The `SessionCoordinator` owns every active game for the lifetime of the
//! service. It maps game names to session slots, loads games from the
//! `GameStore` on first use, and funnels every mutation of a game through that
//! game's own lock.
//!
//! ## Architecture Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                       SessionCoordinator                          │
//! │   sessions: name ──► SessionSlot                                  │
//! │   ┌─────────────────────────────────────────────────────────┐     │
//! │   │ SessionSlot                                             │     │
//! │   │  • room: Mutex<GameSession + connected members>         │     │
//! │   │  • events: broadcast::Sender<RoomEvent>                 │     │
//! │   │  • snapshots: watch::Sender<GameRecord> ──► persister   │     │
//! │   └─────────────────────────────────────────────────────────┘     │
//! │              ▲                      │                    │        │
//! │     join/leave/start/place     room watchers       GameStore      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Move sequence
//! lock room → validate → mutate board → detect win → emit room events and
//! hand the snapshot to the persister → unlock. Both hand-offs are
//! non-blocking channel sends; emitting them before the unlock keeps every
//! watcher's event order identical to the mutation order. The persister task
//! saves the newest snapshot with exponential backoff and marks the session
//! degraded once it gives up; play continues from memory either way.
//!
//! Games never share a lock, so rooms progress fully in parallel. Store calls
//! are the only awaits and never happen while a room is locked.

use crate::board::Position;
use crate::color::Color;
use crate::config::{AppConfig, PersistenceConfig};
use crate::error::GameError;
use crate::events::RoomEvent;
use crate::line::Quintro;
use crate::session::{GameSession, Player, SessionRules, UserRef};
use crate::store::{GameRecord, GameStore, NewGame};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Identifies one transport connection.
pub type ClientId = u64;

/// Reply to a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub color: Color,
    pub order: usize,
}

/// Reply to a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAck {
    pub position: Position,
    pub color: Color,
    pub winner: Option<Color>,
    pub next_turn: Option<Color>,
}

struct Room {
    session: GameSession,
    /// Connected clients; `Some(color)` for clients holding a seat.
    members: HashMap<ClientId, Option<Color>>,
}

impl Room {
    fn holds_seat(&self, color: Color) -> bool {
        self.members.values().any(|seat| *seat == Some(color))
    }
}

struct SessionSlot {
    room: Mutex<Room>,
    events: broadcast::Sender<RoomEvent>,
    snapshots: watch::Sender<Option<GameRecord>>,
    degraded: Arc<AtomicBool>,
}

impl SessionSlot {
    fn emit(&self, event: RoomEvent) {
        debug!(game = event.game_name(), event = event.name(), "room event");
        // No receivers just means nobody is watching.
        let _ = self.events.send(event);
    }

    fn persist(&self, session: &GameSession) {
        self.snapshots.send_replace(Some(session.to_record()));
    }
}

/// Owns all active sessions and serializes mutation per room.
pub struct SessionCoordinator<S: GameStore> {
    store: Arc<S>,
    rules: SessionRules,
    persistence: PersistenceConfig,
    event_buffer: usize,
    default_player_limit: usize,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
    clients: Mutex<HashMap<ClientId, HashSet<String>>>,
    next_client: AtomicU64,
}

impl<S: GameStore> SessionCoordinator<S> {
    pub fn new(store: Arc<S>, config: &AppConfig) -> Arc<Self> {
        Arc::new(SessionCoordinator {
            store,
            rules: config.rules(),
            persistence: config.persistence.clone(),
            event_buffer: config.session.event_buffer,
            default_player_limit: config.session.default_player_limit,
            sessions: RwLock::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            next_client: AtomicU64::new(1),
        })
    }

    pub fn default_player_limit(&self) -> usize {
        self.default_player_limit
    }

    /// Registers a transport connection. Dropping the handle disconnects it.
    pub fn connect(self: &Arc<Self>) -> ClientHandle<S> {
        let id = self.next_client.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().insert(id, HashSet::new());
        debug!(client = id, "client connected");
        ClientHandle {
            id,
            coordinator: Arc::downgrade(self),
        }
    }

    fn track(&self, client: ClientId, game: &str) -> Result<(), GameError> {
        let mut clients = self.clients.lock();
        let rooms = clients
            .get_mut(&client)
            .ok_or_else(|| GameError::validation(format!("unknown client {}", client)))?;
        rooms.insert(game.to_string());
        Ok(())
    }

    /// Validates and creates a new game, making it active immediately.
    pub async fn create_game(&self, params: NewGame) -> Result<GameRecord, GameError> {
        GameSession::new(
            params.name.clone(),
            params.width,
            params.height,
            params.player_limit,
            self.rules,
        )?;
        let already_active = self.sessions.read().contains_key(&params.name);
        if already_active {
            return Err(GameError::validation(format!(
                "game '{}' already exists",
                params.name
            )));
        }
        let record = self.store.create_game(params).await?;
        let session = GameSession::from_record(&record, self.rules)?;
        self.install(session);
        info!(
            game = %record.name,
            width = record.board.width,
            height = record.board.height,
            player_limit = record.player_limit,
            "game created"
        );
        Ok(record)
    }

    fn install(&self, session: GameSession) -> Arc<SessionSlot> {
        let name = session.name().to_string();
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(&name) {
            return existing.clone();
        }
        let (events, _) = broadcast::channel(self.event_buffer);
        let (snapshots, receiver) = watch::channel(None);
        let degraded = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(SessionSlot {
            room: Mutex::new(Room {
                session,
                members: HashMap::new(),
            }),
            events,
            snapshots,
            degraded: degraded.clone(),
        });
        tokio::spawn(persist_snapshots(
            self.store.clone(),
            name.clone(),
            receiver,
            degraded,
            self.persistence.clone(),
        ));
        sessions.insert(name, slot.clone());
        slot
    }

    /// The active slot for `game`, loading it from the store if needed.
    async fn slot(&self, game: &str) -> Result<Arc<SessionSlot>, GameError> {
        let active = self.sessions.read().get(game).cloned();
        if let Some(slot) = active {
            return Ok(slot);
        }
        let record = self.store.get_game(game).await?;
        let session = GameSession::from_record(&record, self.rules)?;
        info!(game, moves = session.board().move_count(), "game loaded");
        Ok(self.install(session))
    }

    /// Runs `f` with the room locked.
    async fn with_room<T>(
        &self,
        game: &str,
        f: impl FnOnce(&SessionSlot, &mut Room) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let slot = self.slot(game).await?;
        let mut room = slot.room.lock();
        f(&slot, &mut *room)
    }

    /// Seats `user` in `game`.
    pub async fn join(
        &self,
        client: ClientId,
        game: &str,
        user: UserRef,
        color: Option<Color>,
    ) -> Result<JoinAck, GameError> {
        self.track(client, game)?;
        self.with_room(game, |slot, room| {
            let outcome = room.session.join(user, color)?;
            let player = outcome.player;
            let was_present = room.holds_seat(player.color);
            let previous = room.members.insert(client, Some(player.color)).flatten();
            room.session.set_presence(player.color, true);

            // A connection holds at most one seat per room.
            if let Some(old) = previous.filter(|&old| old != player.color) {
                if !room.holds_seat(old) {
                    room.session.set_presence(old, false);
                    if let Some(released) = room.session.player_by_color(old).cloned() {
                        info!(game, user = %released.user_ref, color = %old, "seat released");
                        slot.emit(RoomEvent::PlayerLeft {
                            game_name: game.to_string(),
                            player: released,
                        });
                    }
                }
            }

            if !outcome.rejoined {
                info!(game, user = %player.user_ref, color = %player.color, "player joined");
                slot.persist(&room.session);
            }
            if !outcome.rejoined || !was_present {
                slot.emit(RoomEvent::PlayerJoined {
                    game_name: game.to_string(),
                    player: player.clone(),
                });
            }
            Ok(JoinAck {
                color: player.color,
                order: player.order,
            })
        })
        .await
    }

    /// Subscribes `client` to the room's events without taking a seat.
    pub async fn watch(
        &self,
        client: ClientId,
        game: &str,
    ) -> Result<broadcast::Receiver<RoomEvent>, GameError> {
        self.track(client, game)?;
        self.with_room(game, |slot, room| {
            room.members.entry(client).or_insert(None);
            Ok(slot.events.subscribe())
        })
        .await
    }

    /// Gives up `user`'s seat.
    pub async fn leave(&self, game: &str, user: &UserRef) -> Result<Player, GameError> {
        self.with_room(game, |slot, room| {
            let turn_before = room.session.current_turn();
            let player = room.session.leave(user)?;
            for seat in room.members.values_mut() {
                if *seat == Some(player.color) {
                    *seat = None;
                }
            }
            info!(game, user = %player.user_ref, color = %player.color, "player left");
            slot.emit(RoomEvent::PlayerLeft {
                game_name: game.to_string(),
                player: player.clone(),
            });
            let turn_after = room.session.current_turn();
            if let Some(color) = turn_after.filter(|_| turn_after != turn_before) {
                slot.emit(RoomEvent::PlayerChanged {
                    game_name: game.to_string(),
                    color,
                });
            }
            slot.persist(&room.session);
            Ok(player)
        })
        .await
    }

    /// Starts the game once enough players are seated.
    pub async fn start(&self, game: &str) -> Result<(), GameError> {
        self.with_room(game, |slot, room| {
            room.session.start()?;
            info!(game, players = room.session.players().len(), "game started");
            slot.emit(RoomEvent::GameStarted {
                game_name: game.to_string(),
            });
            if let Some(color) = room.session.current_turn() {
                slot.emit(RoomEvent::PlayerChanged {
                    game_name: game.to_string(),
                    color,
                });
            }
            slot.persist(&room.session);
            Ok(())
        })
        .await
    }

    /// Places `user`'s marble at `position`.
    pub async fn place_marble(
        &self,
        game: &str,
        user: &UserRef,
        position: Position,
    ) -> Result<MoveAck, GameError> {
        self.with_room(game, |slot, room| {
            let outcome = room.session.place_marble(user, position)?;
            slot.emit(RoomEvent::MarblePlaced {
                game_name: game.to_string(),
                position,
                color: outcome.color,
            });
            if room.session.is_over() {
                match outcome.winner {
                    Some(winner) => info!(game, %winner, moves = outcome.move_number, "game won"),
                    None => info!(game, moves = outcome.move_number, "board full, game drawn"),
                }
                slot.emit(RoomEvent::GameOver {
                    game_name: game.to_string(),
                    winner: outcome.winner,
                });
            } else if let Some(color) = outcome.next_turn {
                slot.emit(RoomEvent::PlayerChanged {
                    game_name: game.to_string(),
                    color,
                });
            }
            slot.persist(&room.session);
            Ok(MoveAck {
                position,
                color: outcome.color,
                winner: outcome.winner,
                next_turn: outcome.next_turn,
            })
        })
        .await
    }

    /// Which seats currently have a live connection.
    pub async fn player_presence(&self, game: &str) -> Result<BTreeMap<Color, bool>, GameError> {
        self.with_room(game, |_, room| Ok(room.session.presence())).await
    }

    /// The game in its persisted layout.
    pub async fn snapshot(&self, game: &str) -> Result<GameRecord, GameError> {
        self.with_room(game, |_, room| Ok(room.session.to_record())).await
    }

    pub async fn current_turn(&self, game: &str) -> Result<Option<Color>, GameError> {
        self.with_room(game, |_, room| Ok(room.session.current_turn())).await
    }

    /// Every potential quintro on the board, kept up to date move by move.
    pub async fn potential_quintros(&self, game: &str) -> Result<Vec<Quintro>, GameError> {
        self.with_room(game, |_, room| {
            Ok(room.session.potential_quintros().iter().cloned().collect())
        })
        .await
    }

    /// True once saving this game has failed past the retry budget.
    pub fn is_degraded(&self, game: &str) -> bool {
        self.sessions
            .read()
            .get(game)
            .map(|slot| slot.degraded.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn active_games(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops a game from memory. Watchers see their subscription close and the
    /// persister finishes the last snapshot before exiting.
    pub fn close_game(&self, game: &str) -> bool {
        let removed = self.sessions.write().remove(game);
        if removed.is_some() {
            info!(game, "game closed");
        }
        removed.is_some()
    }

    /// Forgets a connection. Seats it held are marked absent and announced
    /// with `player:left` once any in-flight move in that room has finished.
    /// A finished room left without members is evicted.
    pub fn disconnect(&self, client: ClientId) {
        let rooms = self.clients.lock().remove(&client).unwrap_or_default();
        for game in rooms {
            let Some(slot) = self.sessions.read().get(&game).cloned() else {
                continue;
            };
            let mut room = slot.room.lock();
            if let Some(Some(color)) = room.members.remove(&client) {
                if !room.holds_seat(color) {
                    room.session.set_presence(color, false);
                    if let Some(player) = room.session.player_by_color(color).cloned() {
                        info!(game = %game, user = %player.user_ref, %color, "player disconnected");
                        slot.emit(RoomEvent::PlayerLeft {
                            game_name: game.clone(),
                            player,
                        });
                    }
                }
            }

            // Finished rooms nobody is looking at are dropped; the store still
            // has the final snapshot if someone asks for it again.
            if room.session.is_over() && room.members.is_empty() {
                let mut sessions = self.sessions.write();
                if sessions.get(&game).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    sessions.remove(&game);
                    info!(game = %game, "finished game evicted");
                }
            }
        }
        debug!(client, "client disconnected");
    }
}

/// A live connection. Dropping it disconnects the client.
pub struct ClientHandle<S: GameStore> {
    id: ClientId,
    coordinator: Weak<SessionCoordinator<S>>,
}

impl<S: GameStore> ClientHandle<S> {
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl<S: GameStore> Drop for ClientHandle<S> {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.disconnect(self.id);
        }
    }
}

/// Saves the newest snapshot of one game until its slot is dropped.
async fn persist_snapshots<S: GameStore>(
    store: Arc<S>,
    game: String,
    mut snapshots: watch::Receiver<Option<GameRecord>>,
    degraded: Arc<AtomicBool>,
    policy: PersistenceConfig,
) {
    while snapshots.changed().await.is_ok() {
        let Some(record) = snapshots.borrow_and_update().clone() else {
            continue;
        };
        let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
        let mut attempt = 1;
        loop {
            match store.save_game_state(record.clone()).await {
                Ok(_) => {
                    if degraded.swap(false, Ordering::SeqCst) {
                        info!(game = %game, "persistence recovered");
                    }
                    debug!(game = %game, moves = record.board.filled_cells.len(), "game saved");
                    break;
                }
                Err(err) if attempt >= policy.max_attempts => {
                    degraded.store(true, Ordering::SeqCst);
                    error!(
                        game = %game,
                        attempts = attempt,
                        error = %err,
                        "giving up saving game state, session degraded"
                    );
                    break;
                }
                Err(err) => {
                    warn!(
                        game = %game,
                        attempt,
                        error = %err,
                        retry_in_ms = backoff.as_millis() as u64,
                        "saving game state failed"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(policy.max_backoff_ms));
                    attempt += 1;
                    // A newer snapshot supersedes this one.
                    if snapshots.has_changed().unwrap_or(false) {
                        break;
                    }
                }
            }
        }
    }
    debug!(game = %game, "persister stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGameStore;

    fn params(name: &str) -> NewGame {
        NewGame {
            name: name.into(),
            width: 10,
            height: 10,
            player_limit: 3,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_bad_params() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        let mut too_many = params("crowd");
        too_many.player_limit = 7;
        assert_eq!(
            coordinator.create_game(too_many).await.unwrap_err().code(),
            crate::error::ErrorCode::ValidationError
        );
        coordinator.create_game(params("lobby")).await.unwrap();
        assert!(coordinator.create_game(params("lobby")).await.is_err());
        assert_eq!(coordinator.active_games(), vec!["lobby".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        let client = coordinator.connect();
        assert_eq!(
            coordinator
                .join(client.id(), "ghost", UserRef::new("ann"), None)
                .await
                .unwrap_err(),
            GameError::NotFound("ghost".into())
        );
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_watchers() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        coordinator.create_game(params("lobby")).await.unwrap();
        let watcher = coordinator.connect();
        let mut events = coordinator.watch(watcher.id(), "lobby").await.unwrap();

        let client = coordinator.connect();
        let ack = coordinator
            .join(client.id(), "lobby", UserRef::new("ann"), Some(Color::Red))
            .await
            .unwrap();
        assert_eq!(ack, JoinAck { color: Color::Red, order: 0 });

        match events.recv().await.unwrap() {
            RoomEvent::PlayerJoined { player, .. } => assert_eq!(player.color, Color::Red),
            other => panic!("unexpected event {:?}", other),
        }
        let presence = coordinator.player_presence("lobby").await.unwrap();
        assert_eq!(presence.get(&Color::Red), Some(&true));
    }

    #[tokio::test]
    async fn test_dropping_client_marks_absent() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        coordinator.create_game(params("lobby")).await.unwrap();
        let watcher = coordinator.connect();
        let mut events = coordinator.watch(watcher.id(), "lobby").await.unwrap();

        let client = coordinator.connect();
        coordinator
            .join(client.id(), "lobby", UserRef::new("ann"), None)
            .await
            .unwrap();
        drop(client);

        assert!(matches!(events.recv().await.unwrap(), RoomEvent::PlayerJoined { .. }));
        match events.recv().await.unwrap() {
            RoomEvent::PlayerLeft { player, .. } => assert_eq!(player.user_ref, UserRef::new("ann")),
            other => panic!("unexpected event {:?}", other),
        }
        let presence = coordinator.player_presence("lobby").await.unwrap();
        assert_eq!(presence.get(&Color::Blue), Some(&false));
    }

    #[tokio::test]
    async fn test_second_join_on_one_connection_releases_first_seat() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        coordinator.create_game(params("g")).await.unwrap();
        let watcher = coordinator.connect();
        let mut events = coordinator.watch(watcher.id(), "g").await.unwrap();

        let client = coordinator.connect();
        coordinator
            .join(client.id(), "g", UserRef::new("ann"), None)
            .await
            .unwrap();
        coordinator
            .join(client.id(), "g", UserRef::new("bob"), None)
            .await
            .unwrap();

        let presence = coordinator.player_presence("g").await.unwrap();
        assert_eq!(presence.get(&Color::Blue), Some(&false));
        assert_eq!(presence.get(&Color::Red), Some(&true));

        drop(client);
        let presence = coordinator.player_presence("g").await.unwrap();
        assert_eq!(presence.get(&Color::Blue), Some(&false));
        assert_eq!(presence.get(&Color::Red), Some(&false));

        let mut left = Vec::new();
        for _ in 0..4 {
            if let RoomEvent::PlayerLeft { player, .. } = events.recv().await.unwrap() {
                left.push(player.color);
            }
        }
        assert_eq!(left, vec![Color::Blue, Color::Red]);
    }

    #[tokio::test]
    async fn test_finished_games_are_evicted_once_empty() {
        let store = Arc::new(MemoryGameStore::new());
        let coordinator = SessionCoordinator::new(store.clone(), &AppConfig::default());
        let users: Vec<UserRef> = ["ann", "bob", "cat"].iter().map(|u| UserRef::new(*u)).collect();

        let mut clients = Vec::new();
        for g in 0..10 {
            let name = format!("done-{}", g);
            coordinator.create_game(params(&name)).await.unwrap();
            for user in &users {
                let client = coordinator.connect();
                coordinator
                    .join(client.id(), &name, user.clone(), None)
                    .await
                    .unwrap();
                clients.push(client);
            }
            coordinator.start(&name).await.unwrap();
            for col in 0..5 {
                coordinator
                    .place_marble(&name, &users[0], Position::new(col, 0))
                    .await
                    .unwrap();
                if col < 4 {
                    coordinator
                        .place_marble(&name, &users[1], Position::new(col, 5))
                        .await
                        .unwrap();
                    coordinator
                        .place_marble(&name, &users[2], Position::new(col, 9))
                        .await
                        .unwrap();
                }
            }
        }
        coordinator.create_game(params("open")).await.unwrap();
        let lingering = coordinator.connect();
        coordinator
            .join(lingering.id(), "open", UserRef::new("dan"), None)
            .await
            .unwrap();
        assert_eq!(coordinator.active_games().len(), 11);

        drop(clients);
        drop(lingering);
        assert_eq!(coordinator.active_games(), vec!["open".to_string()]);

        // Evicted games are still served from the store.
        for _ in 0..100 {
            if store.peek("done-0").map(|r| r.board.filled_cells.len()) == Some(13) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let record = coordinator.snapshot("done-0").await.unwrap();
        assert_eq!(record.board.filled_cells.len(), 13);
        assert_eq!(coordinator.current_turn("done-0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_games_are_loaded_from_the_store() {
        let store = Arc::new(MemoryGameStore::new());
        let first = SessionCoordinator::new(store.clone(), &AppConfig::default());
        first.create_game(params("lobby")).await.unwrap();
        let client = first.connect();
        first
            .join(client.id(), "lobby", UserRef::new("ann"), None)
            .await
            .unwrap();

        for _ in 0..100 {
            if store.peek("lobby").map(|r| r.players.len()) == Some(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = SessionCoordinator::new(store, &AppConfig::default());
        let record = second.snapshot("lobby").await.unwrap();
        assert_eq!(record.players.len(), 1);
        assert_eq!(record.players[0].color, Color::Blue);
    }

    #[tokio::test]
    async fn test_close_game_ends_subscriptions() {
        let coordinator = SessionCoordinator::new(Arc::new(MemoryGameStore::new()), &AppConfig::default());
        coordinator.create_game(params("lobby")).await.unwrap();
        let watcher = coordinator.connect();
        let mut events = coordinator.watch(watcher.id(), "lobby").await.unwrap();
        assert!(coordinator.close_game("lobby"));
        assert!(matches!(
            events.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(!coordinator.close_game("lobby"));
    }
}
