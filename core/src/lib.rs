//! # lexicon-core
//!
//! Core library for the Lexicon vocabulary app.
//!
//! This crate provides:
//! - SQLite persistence with an explicit save/rollback session
//! - Managers for words, idioms, tags, quizzes, statistics and shared dictionaries
//! - Providers that re-fetch and republish lists when the store changes
//! - Difficulty scoring shared by every platform
//! - CSV import/export and merging of changes received from cloud sync
//! - C FFI and JNI exports for the mobile apps
//!
//! ## Usage
//!
//! ```ignore
//! use lexicon_core::{Lexicon, NewWord, StoreConfig};
//!
//! let lexicon = Lexicon::open(StoreConfig::with_path("/path/to/lexicon.db"))?;
//! let mut words = lexicon.words_provider();
//!
//! lexicon.words().add_new(NewWord::new("sonder", "the realization that ..."))?;
//! lexicon.save()?;
//!
//! words.process_notifications();
//! for word in words.items() {
//!     println!("{} ({:?})", word.text, word.difficulty());
//! }
//! ```

pub mod config;
pub mod csv;
pub mod db;
pub mod difficulty;
pub mod error;
pub mod events;
pub mod ffi;
pub mod idioms;
pub mod lookup;
pub mod models;
pub mod provider;
pub mod quiz;
pub mod shared;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tags;
pub mod words;

use std::rc::Rc;

pub use config::{ScoreRules, StoreConfig};
pub use csv::ImportStats;
pub use difficulty::Difficulty;
pub use error::{Error, InternalError, NetworkError, Result, StorageError, ValidationError};
pub use events::{ChangeOrigin, StoreEvent};
pub use models::{
    EntryRef, Idiom, PartOfSpeech, Preferences, Progress, QuizSession, QuizType,
    SharedDictionary, SharedWord, Tag, TagColor, UserStats, Word,
};
pub use provider::{IdiomsProvider, Provider, TagsProvider, WordsProvider};
pub use store::PersistentStore;
pub use words::NewWord;

use idioms::IdiomsManager;
use quiz::QuizRecorder;
use shared::SharedDictionaryManager;
use stats::StatsManager;
use sync::SyncBridge;
use tags::TagManager;
use words::WordsManager;

/// One store with its managers, wired together
///
/// Everything here lives on the thread that opened it. Mutations made
/// through any manager stay pending until [`Lexicon::save`].
pub struct Lexicon {
    store: Rc<PersistentStore>,
    words: WordsManager,
    idioms: IdiomsManager,
    tags: TagManager,
    quiz: QuizRecorder,
    stats: StatsManager,
    sync: SyncBridge,
}

impl Lexicon {
    /// Open the store described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Store location and tuning; `db_path: None` opens an
    ///   in-memory store
    ///
    /// # Returns
    ///
    /// The wired-up store, or `StorageError::InitFailed` if the database
    /// cannot be opened.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let store = Rc::new(PersistentStore::open(config)?);
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: Rc<PersistentStore>) -> Self {
        Self {
            words: WordsManager::new(store.clone()),
            idioms: IdiomsManager::new(store.clone()),
            tags: TagManager::new(store.clone()),
            quiz: QuizRecorder::new(store.clone()),
            stats: StatsManager::new(store.clone()),
            sync: SyncBridge::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Rc<PersistentStore> {
        &self.store
    }

    pub fn words(&self) -> &WordsManager {
        &self.words
    }

    pub fn idioms(&self) -> &IdiomsManager {
        &self.idioms
    }

    pub fn tags(&self) -> &TagManager {
        &self.tags
    }

    pub fn quiz(&self) -> &QuizRecorder {
        &self.quiz
    }

    pub fn stats(&self) -> &StatsManager {
        &self.stats
    }

    pub fn sync(&self) -> &SyncBridge {
        &self.sync
    }

    /// Shared dictionaries as seen by `user_id`
    pub fn shared_dictionaries(&self, user_id: &str) -> SharedDictionaryManager {
        SharedDictionaryManager::new(self.store.clone(), user_id)
    }

    pub fn words_provider(&self) -> WordsProvider {
        Provider::new(self.store.clone())
    }

    pub fn idioms_provider(&self) -> IdiomsProvider {
        Provider::new(self.store.clone())
    }

    pub fn tags_provider(&self) -> TagsProvider {
        Provider::new(self.store.clone())
    }

    /// Commit pending changes and notify subscribers
    pub fn save(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }

    /// Discard pending changes
    pub fn discard(&self) -> Result<()> {
        Ok(self.store.rollback()?)
    }
}

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
