//! Store configuration
//!
//! Defaults match the behaviour of the mobile apps. A JSON file can override
//! any subset of the fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, ValidationError};
use crate::Result;

/// Points added to or removed from a difficulty score per quiz answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreRules {
    /// Added on a correct answer
    pub correct_delta: i32,
    /// Added on an incorrect answer (negative)
    pub incorrect_delta: i32,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            correct_delta: 5,
            incorrect_delta: -3,
        }
    }
}

/// Configuration for a [`PersistentStore`](crate::store::PersistentStore)
/// and the managers built on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` means in-memory
    pub db_path: Option<PathBuf>,
    /// Window used to coalesce change notifications, in milliseconds
    pub debounce_ms: u64,
    /// Maximum number of tags on a single word or idiom
    pub max_tags_per_entry: usize,
    /// Quiz scoring
    pub score: ScoreRules,
    /// Language code given to entries created without one
    pub default_language_code: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            debounce_ms: 300,
            max_tags_per_entry: 5,
            score: ScoreRules::default(),
            default_language_code: "en".to_string(),
        }
    }
}

impl StoreConfig {
    /// Default configuration backed by a database file
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(db_path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", path.display(), e)))?;
        let config: StoreConfig =
            serde_json::from_str(&text).map_err(|e| ValidationError::InvalidField {
                field: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the managers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_tags_per_entry == 0 {
            return Err(ValidationError::InvalidField {
                field: "max_tags_per_entry".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.score.correct_delta <= 0 || self.score.incorrect_delta >= 0 {
            return Err(ValidationError::InvalidField {
                field: "score".to_string(),
                reason: "correct_delta must be positive and incorrect_delta negative".to_string(),
            }
            .into());
        }
        if self.default_language_code.trim().is_empty() {
            return Err(ValidationError::MissingField("default_language_code".to_string()).into());
        }
        Ok(())
    }

    /// Debounce window as a `Duration`
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
