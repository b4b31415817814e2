use std::path::{Path, PathBuf};

use crate::board::BoardLimits;
use crate::color::Color;
use crate::detector::DetectorConfig;
use crate::error::ConfigError;
use crate::session::SessionRules;

/// Session-level settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Active players needed before a game can start.
    pub min_players_to_start: usize,
    /// Player limit used when a create request does not name one.
    pub default_player_limit: usize,
    /// Room events buffered per game for slow watchers.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            min_players_to_start: 3,
            default_player_limit: 3,
            event_buffer: 256,
        }
    }
}

/// Retry policy for saving game state after a move.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

/// Network and storage settings for the server binary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory for JSON game files; games are kept in memory when unset.
    pub data_dir: Option<PathBuf>,
    /// Tokio worker threads; 0 means one per CPU.
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:7878".to_string(),
            data_dir: None,
            worker_threads: 0,
        }
    }
}

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub board: BoardLimits,
    pub session: SessionConfig,
    pub detector: DetectorConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.min_size < 5 {
            return Err(ConfigError::Validation(
                "board.min_size must be >= 5".into(),
            ));
        }
        if self.board.max_size < self.board.min_size {
            return Err(ConfigError::Validation(
                "board.max_size must be >= board.min_size".into(),
            ));
        }
        if self.session.min_players_to_start == 0 {
            return Err(ConfigError::Validation(
                "session.min_players_to_start must be > 0".into(),
            ));
        }
        if self.session.min_players_to_start > Color::PALETTE.len() {
            return Err(ConfigError::Validation(format!(
                "session.min_players_to_start must be <= {}",
                Color::PALETTE.len()
            )));
        }
        if self.session.default_player_limit < self.session.min_players_to_start
            || self.session.default_player_limit > Color::PALETTE.len()
        {
            return Err(ConfigError::Validation(format!(
                "session.default_player_limit must be in [{}, {}]",
                self.session.min_players_to_start,
                Color::PALETTE.len()
            )));
        }
        if self.session.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "session.event_buffer must be > 0".into(),
            ));
        }
        if self.persistence.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "persistence.max_attempts must be > 0".into(),
            ));
        }
        if self.persistence.max_backoff_ms < self.persistence.initial_backoff_ms {
            return Err(ConfigError::Validation(
                "persistence.max_backoff_ms must be >= persistence.initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Game rules handed to every session.
    pub fn rules(&self) -> SessionRules {
        SessionRules {
            min_players_to_start: self.session.min_players_to_start,
            board_limits: self.board,
            detector: self.detector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.rules(), SessionRules::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [board]
            max_size = 19

            [detector]
            include_empty_runs = false
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.board.max_size, 19);
        assert_eq!(config.board.min_size, 5);
        assert!(!config.detector.include_empty_runs);
        assert_eq!(config.session.min_players_to_start, 3);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.session.default_player_limit = 7;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.board.min_size = 3;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.persistence.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "config validation error: persistence.max_attempts must be > 0"
        );
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = AppConfig::load_or_default(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7878");
    }
}
