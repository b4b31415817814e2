//! # Game Store
//!
//! The persistence seam. A `GameStore` creates, loads and saves games in the
//! persisted record layout:
//!
//! ```text
//! {name, board:{width,height,filledCells:[{position:[col,row],color}]},
//!  players:[{color,userRef,order,active}], playerLimit, isStarted, winner}
//! ```
//!
//! Two implementations ship with the crate: `MemoryGameStore` for tests and
//! single-process deployments, and `JsonDirStore`, which keeps one JSON file
//! per game in a directory.

use crate::board::Position;
use crate::color::Color;
use crate::error::StoreError;
use crate::session::Player;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parameters for a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub player_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledCell {
    pub position: Position,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub width: usize,
    pub height: usize,
    /// In move order.
    pub filled_cells: Vec<FilledCell>,
}

/// Persisted snapshot of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub name: String,
    pub board: BoardRecord,
    pub players: Vec<Player>,
    pub player_limit: usize,
    pub is_started: bool,
    pub winner: Option<Color>,
}

impl GameRecord {
    /// Record of a game nobody has joined yet.
    pub fn empty(params: &NewGame) -> Self {
        GameRecord {
            name: params.name.clone(),
            board: BoardRecord {
                width: params.width,
                height: params.height,
                filled_cells: Vec::new(),
            },
            players: Vec::new(),
            player_limit: params.player_limit,
            is_started: false,
            winner: None,
        }
    }
}

/// Asynchronous game persistence.
pub trait GameStore: Send + Sync + 'static {
    fn create_game(
        &self,
        params: NewGame,
    ) -> impl Future<Output = Result<GameRecord, StoreError>> + Send;

    fn get_game(&self, name: &str) -> impl Future<Output = Result<GameRecord, StoreError>> + Send;

    fn save_game_state(
        &self,
        record: GameRecord,
    ) -> impl Future<Output = Result<GameRecord, StoreError>> + Send;
}

/// In-process store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryGameStore {
    games: Mutex<HashMap<String, GameRecord>>,
    failing_saves: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail with `StoreError::Unavailable`.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current stored record, without going through the async API.
    pub fn peek(&self, name: &str) -> Option<GameRecord> {
        self.games.lock().get(name).cloned()
    }
}

impl GameStore for MemoryGameStore {
    async fn create_game(&self, params: NewGame) -> Result<GameRecord, StoreError> {
        let mut games = self.games.lock();
        if games.contains_key(&params.name) {
            return Err(StoreError::AlreadyExists(params.name));
        }
        let record = GameRecord::empty(&params);
        games.insert(params.name, record.clone());
        Ok(record)
    }

    async fn get_game(&self, name: &str) -> Result<GameRecord, StoreError> {
        self.games
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn save_game_state(&self, record: GameRecord) -> Result<GameRecord, StoreError> {
        let pending = self.failing_saves.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_saves.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        let mut games = self.games.lock();
        if !games.contains_key(&record.name) {
            return Err(StoreError::NotFound(record.name));
        }
        games.insert(record.name.clone(), record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

/// One `<name>.json` file per game.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Opens (and creates if needed) the store directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(JsonDirStore { dir })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Validation(format!(
                "game name '{}' may only contain letters, digits, '-' and '_'",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    async fn write(&self, path: &Path, record: &GameRecord) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl GameStore for JsonDirStore {
    async fn create_game(&self, params: NewGame) -> Result<GameRecord, StoreError> {
        let path = self.path_for(&params.name)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(params.name));
        }
        let record = GameRecord::empty(&params);
        self.write(&path, &record).await?;
        Ok(record)
    }

    async fn get_game(&self, name: &str) -> Result<GameRecord, StoreError> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_game_state(&self, record: GameRecord) -> Result<GameRecord, StoreError> {
        let path = self.path_for(&record.name)?;
        self.write(&path, &record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(name: &str) -> NewGame {
        NewGame {
            name: name.into(),
            width: 10,
            height: 10,
            player_limit: 3,
        }
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryGameStore::new();
        let record = store.create_game(params("lobby")).await.unwrap();
        assert!(record.players.is_empty());
        assert!(matches!(
            store.create_game(params("lobby")).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let mut updated = record.clone();
        updated.is_started = true;
        store.save_game_state(updated.clone()).await.unwrap();
        assert_eq!(store.get_game("lobby").await.unwrap(), updated);
        assert_eq!(store.save_count(), 1);
        assert!(matches!(
            store.get_game("nowhere").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_injected_failures() {
        let store = MemoryGameStore::new();
        let record = store.create_game(params("lobby")).await.unwrap();
        store.fail_next_saves(2);
        assert!(store.save_game_state(record.clone()).await.is_err());
        assert!(store.save_game_state(record.clone()).await.is_err());
        assert!(store.save_game_state(record).await.is_ok());
    }

    #[tokio::test]
    async fn test_json_dir_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("quintro-store-{}", std::process::id()));
        let store = JsonDirStore::open(&dir).await.unwrap();
        let mut record = store.create_game(params("file-game")).await.unwrap();
        record.board.filled_cells.push(FilledCell {
            position: Position::new(2, 3),
            color: Color::Purple,
        });
        store.save_game_state(record.clone()).await.unwrap();
        assert_eq!(store.get_game("file-game").await.unwrap(), record);
        assert!(matches!(
            store.get_game("../etc").await,
            Err(StoreError::Validation(_))
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn test_record_layout() {
        let record = GameRecord::empty(&params("lobby"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["board"]["filledCells"], serde_json::json!([]));
        assert_eq!(json["playerLimit"], 3);
        assert_eq!(json["isStarted"], false);
        assert!(json["winner"].is_null());
    }
}
