//! Persistent store
//!
//! Wraps the SQLite connection and the session semantics the managers rely
//! on: the first mutation opens a write transaction, reads on the same store
//! see pending changes, and [`PersistentStore::save_context`] commits them
//! and reports a change to subscribers.
//!
//! The store is confined to one thread (`rusqlite::Connection` is not
//! `Sync`), and is shared between managers and providers with `Rc`.

use std::cell::Cell;
use std::sync::mpsc::Receiver;

use rusqlite::{Connection, OpenFlags};

use crate::config::StoreConfig;
use crate::db;
use crate::error::StorageError;
use crate::events::{ChangeNotifier, ChangeOrigin, StoreEvent};

/// On-device store for all entities
pub struct PersistentStore {
    conn: Connection,
    pending: Cell<bool>,
    notifier: ChangeNotifier,
    config: StoreConfig,
}

impl PersistentStore {
    /// Open the store described by `config`
    ///
    /// Opens (or creates) the database file, or an in-memory database when
    /// `db_path` is `None`, and applies the schema. Failure is returned to
    /// the caller rather than aborting.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        let conn = match &config.db_path {
            Some(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_CREATE
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| StorageError::InitFailed(format!("{}: {}", path.display(), e)))?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;",
                )
                .map_err(|e| StorageError::InitFailed(e.to_string()))?;
                conn
            }
            None => Connection::open_in_memory()
                .map_err(|e| StorageError::InitFailed(e.to_string()))?,
        };

        Self::with_connection(conn, config)
    }

    /// Open an in-memory store, ignoring `config.db_path`
    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::InitFailed(e.to_string()))?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: StoreConfig) -> Result<Self, StorageError> {
        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StorageError::InitFailed(e.to_string()))?;

        let found = db::apply_schema(&conn).map_err(|e| StorageError::InitFailed(e.to_string()))?;
        if found > db::SCHEMA_VERSION {
            return Err(StorageError::InitFailed(format!(
                "database schema version {} is newer than supported version {}",
                found,
                db::SCHEMA_VERSION
            )));
        }

        log::info!(
            "Opened store at {}",
            config
                .db_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );

        Ok(Self {
            conn,
            pending: Cell::new(false),
            notifier: ChangeNotifier::new(config.debounce()),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run a query; failures become `ReadFailed` or `DataCorrupted`
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        f(&self.conn).map_err(StorageError::read)
    }

    /// Run a mutation inside the session
    ///
    /// Opens the write transaction on first use. The session only becomes
    /// pending once a mutation succeeds and changes at least one row; a
    /// failing or empty first mutation rolls the transaction back. A failing
    /// later mutation leaves earlier ones pending.
    pub fn mutate<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        if self.pending.get() {
            return f(&self.conn).map_err(StorageError::save);
        }

        let before = self.total_changes().map_err(StorageError::save)?;
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(StorageError::save)?;

        let result = f(&self.conn).map_err(StorageError::save);
        let changed = result.is_ok()
            && self
                .total_changes()
                .map(|after| after > before)
                .unwrap_or(true);

        if changed {
            self.pending.set(true);
        } else if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            log::warn!("Rollback of empty session failed: {}", e);
        }
        result
    }

    fn total_changes(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT total_changes()", [], |row| row.get(0))
    }

    /// Whether the session holds uncommitted changes
    pub fn has_changes(&self) -> bool {
        self.pending.get()
    }

    /// Commit pending changes and notify subscribers
    ///
    /// Does nothing when there is nothing to commit. When the commit fails
    /// the session is rolled back.
    pub fn save_context(&self) -> Result<(), StorageError> {
        self.commit(ChangeOrigin::Local)
    }

    /// Commit changes merged from the cloud
    pub(crate) fn save_merged(&self) -> Result<(), StorageError> {
        self.commit(ChangeOrigin::Remote)
    }

    fn commit(&self, origin: ChangeOrigin) -> Result<(), StorageError> {
        if !self.pending.get() {
            return Ok(());
        }

        if let Err(e) = self.conn.execute_batch("COMMIT") {
            log::error!("Commit failed, rolling back: {}", e);
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback after failed commit also failed: {}", rollback_err);
            }
            self.pending.set(false);
            return Err(StorageError::save(e));
        }

        self.pending.set(false);
        self.notifier.notify(origin);
        Ok(())
    }

    /// Discard pending changes
    pub fn rollback(&self) -> Result<(), StorageError> {
        if !self.pending.get() {
            return Ok(());
        }
        self.pending.set(false);
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| StorageError::SaveFailed(format!("rollback: {}", e)))
    }

    /// Receive a [`StoreEvent`] after each (debounced) save or merge
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.notifier.subscribe()
    }
}

impl Drop for PersistentStore {
    fn drop(&mut self) {
        if self.pending.get() {
            log::warn!("Store dropped with unsaved changes; they are discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartOfSpeech, Word};
    use chrono::Utc;
    use uuid::Uuid;

    fn test_config() -> StoreConfig {
        StoreConfig {
            debounce_ms: 0,
            ..StoreConfig::default()
        }
    }

    fn sample_word() -> Word {
        Word {
            id: Uuid::new_v4(),
            text: "gregarious".to_string(),
            definition: "fond of company".to_string(),
            part_of_speech: PartOfSpeech::Adjective,
            phonetic: None,
            language_code: "en".to_string(),
            timestamp: Utc::now(),
            is_favorite: false,
            examples: Vec::new(),
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.db");
        let store = PersistentStore::open(StoreConfig::with_path(&path)).unwrap();
        assert!(!store.has_changes());
        assert!(path.exists());
    }

    #[test]
    fn test_save_without_changes_is_noop() {
        let store = PersistentStore::open_in_memory(test_config()).unwrap();
        let events = store.subscribe();

        store.save_context().unwrap();

        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_save_commits_and_notifies() {
        let store = PersistentStore::open_in_memory(test_config()).unwrap();
        let events = store.subscribe();
        let word = sample_word();

        store.mutate(|conn| db::insert_word(conn, &word)).unwrap();
        assert!(store.has_changes());
        // pending changes are visible to reads in the same session
        assert!(store.read(|conn| db::get_word(conn, word.id)).unwrap().is_some());

        store.save_context().unwrap();
        assert!(!store.has_changes());
        assert!(matches!(
            events.try_recv(),
            Ok(StoreEvent::DataUpdated { local: true, .. })
        ));
    }

    #[test]
    fn test_rollback_discards_changes() {
        let store = PersistentStore::open_in_memory(test_config()).unwrap();
        let word = sample_word();

        store.mutate(|conn| db::insert_word(conn, &word)).unwrap();
        store.rollback().unwrap();

        assert!(!store.has_changes());
        assert!(store.read(|conn| db::get_word(conn, word.id)).unwrap().is_none());
    }

    #[test]
    fn test_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.db");
        let word = sample_word();

        {
            let store = PersistentStore::open(StoreConfig {
                debounce_ms: 0,
                ..StoreConfig::with_path(&path)
            })
            .unwrap();
            store.mutate(|conn| db::insert_word(conn, &word)).unwrap();
            store.save_context().unwrap();
        }

        let store = PersistentStore::open(StoreConfig::with_path(&path)).unwrap();
        let loaded = store.read(|conn| db::get_word(conn, word.id)).unwrap();
        assert_eq!(loaded.map(|w| w.text), Some("gregarious".to_string()));
    }

    #[test]
    fn test_failed_mutation_maps_to_save_failed() {
        let store = PersistentStore::open_in_memory(test_config()).unwrap();
        let word = sample_word();
        store.mutate(|conn| db::insert_word(conn, &word)).unwrap();

        let err = store.mutate(|conn| db::insert_word(conn, &word)).unwrap_err();
        assert!(matches!(err, StorageError::SaveFailed(_)));
        // the first insert is still pending
        assert!(store.has_changes());
    }

    #[test]
    fn test_mutation_without_effect_leaves_no_session() {
        let store = PersistentStore::open_in_memory(test_config()).unwrap();
        let events = store.subscribe();

        let deleted = store
            .mutate(|conn| db::delete_word(conn, Uuid::new_v4()))
            .unwrap();
        assert!(!deleted);
        assert!(!store.has_changes());

        let word = sample_word();
        store.mutate(|conn| db::insert_word(conn, &word)).unwrap();
        store.save_context().unwrap();
        let err = store.mutate(|conn| db::insert_word(conn, &word)).unwrap_err();
        assert!(matches!(err, StorageError::SaveFailed(_)));
        assert!(!store.has_changes());

        // only the insert was published
        assert_eq!(events.try_iter().count(), 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        }

        let err = PersistentStore::open(StoreConfig::with_path(&path)).err().unwrap();
        assert!(matches!(err, StorageError::InitFailed(_)));
    }
}
