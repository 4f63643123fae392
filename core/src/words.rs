//! Word management
//!
//! Mutations stay pending in the store's session until
//! [`WordsManager::save_context`] is called.

use std::path::Path;
use std::rc::Rc;

use chrono::Utc;
use uuid::Uuid;

use crate::csv::{self, ImportStats};
use crate::db;
use crate::error::{InternalError, Result};
use crate::lookup::DefinitionLookup;
use crate::models::{EntryRef, PartOfSpeech, Word};
use crate::store::PersistentStore;
use crate::tags;

/// Input for [`WordsManager::add_new`]
#[derive(Debug, Clone, Default)]
pub struct NewWord {
    pub text: String,
    pub definition: String,
    pub part_of_speech: Option<PartOfSpeech>,
    pub phonetic: Option<String>,
    pub examples: Vec<String>,
    /// Defaults to the store's language
    pub language_code: Option<String>,
}

impl NewWord {
    pub fn new(text: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            definition: definition.into(),
            ..Self::default()
        }
    }
}

pub struct WordsManager {
    store: Rc<PersistentStore>,
}

impl WordsManager {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Create a word
    ///
    /// Text and definition are trimmed and must be non-empty; otherwise
    /// nothing is written.
    pub fn add_new(&self, input: NewWord) -> Result<Word> {
        let text = input.text.trim();
        let definition = input.definition.trim();
        if text.is_empty() || definition.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }

        let word = Word {
            id: Uuid::new_v4(),
            text: text.to_string(),
            definition: definition.to_string(),
            part_of_speech: input.part_of_speech.unwrap_or(PartOfSpeech::Unknown),
            phonetic: input.phonetic.filter(|p| !p.trim().is_empty()),
            language_code: input
                .language_code
                .unwrap_or_else(|| self.store.config().default_language_code.clone()),
            timestamp: Utc::now(),
            is_favorite: false,
            examples: clean_examples(input.examples),
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        };

        if let Err(e) = self.store.mutate(|conn| db::insert_word(conn, &word)) {
            log::error!("Saving word '{}' failed: {}", word.text, e);
            return Err(InternalError::SavingWordFailed.into());
        }
        log::debug!("Added word '{}' ({})", word.text, word.id);
        Ok(word)
    }

    /// Create a word from the first meaning a dictionary service returns
    pub fn add_from_lookup(&self, lookup: &dyn DefinitionLookup, text: &str) -> Result<Word> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }

        let results = lookup.lookup(text)?;
        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| InternalError::DefinitionNotFound(text.to_string()))?;

        self.add_new(NewWord {
            text: first.word,
            definition: first.definition,
            part_of_speech: Some(first.part_of_speech),
            phonetic: first.phonetic,
            examples: first.examples,
            language_code: None,
        })
    }

    /// Overwrite the editable fields of a stored word
    ///
    /// Text and definition are stored trimmed, as in [`WordsManager::add_new`].
    pub fn update(&self, word: &Word) -> Result<()> {
        let text = word.text.trim();
        let definition = word.definition.trim();
        if text.is_empty() || definition.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        let word = Word {
            text: text.to_string(),
            definition: definition.to_string(),
            ..word.clone()
        };

        match self.store.mutate(|conn| db::update_word(conn, &word)) {
            Ok(true) => Ok(()),
            Ok(false) => Err(InternalError::EntryNotFound(word.id.to_string()).into()),
            Err(e) => {
                log::error!("Updating word {} failed: {}", word.id, e);
                Err(InternalError::SavingWordFailed.into())
            }
        }
    }

    /// Flip the favorite flag; returns the new value
    pub fn toggle_favorite(&self, word_id: Uuid) -> Result<bool> {
        let mut word = self.existing(word_id)?;
        word.is_favorite = !word.is_favorite;
        self.update(&word)?;
        Ok(word.is_favorite)
    }

    pub fn add_example(&self, word_id: Uuid, example: &str) -> Result<Word> {
        let example = example.trim();
        if example.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        let mut word = self.existing(word_id)?;
        word.examples.push(example.to_string());
        self.update(&word)?;
        Ok(word)
    }

    /// Remove the example at `index`; out-of-range indices are ignored
    pub fn remove_example(&self, word_id: Uuid, index: usize) -> Result<Word> {
        let mut word = self.existing(word_id)?;
        if index < word.examples.len() {
            word.examples.remove(index);
            self.update(&word)?;
        }
        Ok(word)
    }

    pub fn add_tag(&self, word_id: Uuid, tag_id: Uuid) -> Result<()> {
        tags::assign_tag(&self.store, &EntryRef::Word(word_id), tag_id).map(|_| ())
    }

    pub fn remove_tag(&self, word_id: Uuid, tag_id: Uuid) -> Result<()> {
        tags::unassign_tag(&self.store, &EntryRef::Word(word_id), tag_id).map(|_| ())
    }

    /// Delete a word with its tag links and progress
    pub fn delete(&self, word_id: Uuid) -> Result<()> {
        match self.store.mutate(|conn| db::delete_word(conn, word_id)) {
            Ok(true) => Ok(()),
            Ok(false) => Err(InternalError::EntryNotFound(word_id.to_string()).into()),
            Err(e) => {
                log::error!("Deleting word {} failed: {}", word_id, e);
                Err(InternalError::DeletingWordFailed.into())
            }
        }
    }

    pub fn word(&self, word_id: Uuid) -> Result<Option<Word>> {
        Ok(self.store.read(|conn| db::get_word(conn, word_id))?)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }

    /// Import a CSV backup (`.csv` or `.csv.gz`)
    ///
    /// Words whose id is already stored are skipped. Imported words are
    /// pending until the next save.
    ///
    /// # Arguments
    /// * `path` - File to read
    /// * `progress` - Called with (rows done, total rows)
    pub fn import_csv(&self, path: &Path, progress: impl Fn(u64, u64)) -> Result<ImportStats> {
        let text = csv::read_file(path).map_err(|e| {
            log::error!("Reading {} failed: {}", path.display(), e);
            InternalError::ImportFailed(e.to_string())
        })?;

        let current = self.store.read(db::word_ids)?;
        let language = self.store.config().default_language_code.clone();
        let outcome = csv::import_words(&text, &current, &language, progress);

        let mut stats = outcome.stats;
        for word in &outcome.words {
            if let Err(e) = self.store.mutate(|conn| db::insert_word(conn, word)) {
                log::warn!("Skipping imported word '{}': {}", word.text, e);
                stats.words_imported -= 1;
                stats.errors += 1;
            }
        }

        log::info!(
            "Imported {} words from {}",
            stats.words_imported,
            path.display()
        );
        Ok(stats)
    }

    /// Write every word to a CSV backup; returns the number written
    pub fn export_csv(&self, path: &Path) -> Result<usize> {
        let words = self.store.read(db::list_words)?;
        csv::write_file(path, &csv::export_words(&words)).map_err(|e| {
            log::error!("Writing {} failed: {}", path.display(), e);
            InternalError::ExportFailed(e.to_string())
        })?;
        log::info!("Exported {} words to {}", words.len(), path.display());
        Ok(words.len())
    }

    fn existing(&self, word_id: Uuid) -> Result<Word> {
        self.word(word_id)?
            .ok_or_else(|| InternalError::EntryNotFound(word_id.to_string()).into())
    }
}

/// Trim examples and drop empty ones
pub(crate) fn clean_examples(examples: Vec<String>) -> Vec<String> {
    examples
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::{Error, NetworkError};
    use crate::lookup::LookupResult;
    use crate::models::TagColor;
    use crate::provider::WordsProvider;
    use crate::tags::TagManager;

    fn test_store() -> Rc<PersistentStore> {
        let config = StoreConfig {
            debounce_ms: 0,
            ..StoreConfig::default()
        };
        Rc::new(PersistentStore::open_in_memory(config).unwrap())
    }

    struct FakeLookup(std::result::Result<Vec<LookupResult>, NetworkError>);

    impl DefinitionLookup for FakeLookup {
        fn lookup(&self, _word: &str) -> std::result::Result<Vec<LookupResult>, NetworkError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_add_new_then_save_is_visible_to_provider() {
        let store = test_store();
        let words = WordsManager::new(store.clone());
        let mut provider = WordsProvider::new(store);

        let word = words.add_new(NewWord::new("  serendipity ", "a happy accident")).unwrap();
        words.save_context().unwrap();
        provider.process_notifications();

        assert_eq!(word.text, "serendipity");
        assert_eq!(word.difficulty_score, 0);
        assert!(!word.has_been_practiced);
        assert_eq!(word.language_code, "en");
        assert_eq!(provider.items(), &[word][..]);
    }

    #[test]
    fn test_empty_input_leaves_store_untouched() {
        let store = test_store();
        let words = WordsManager::new(store.clone());

        for (text, definition) in [("", "x"), ("x", "  "), (" \t", "\n")] {
            assert_eq!(
                words.add_new(NewWord::new(text, definition)).unwrap_err(),
                Error::Internal(InternalError::InputCannotBeEmpty)
            );
        }
        assert!(!store.has_changes());
        assert_eq!(store.read(db::count_words).unwrap(), 0);
    }

    #[test]
    fn test_delete_then_save_removes_word_and_links() {
        let store = test_store();
        let words = WordsManager::new(store.clone());
        let tags = TagManager::new(store.clone());
        let mut provider = WordsProvider::new(store.clone());

        let word = words.add_new(NewWord::new("ephemeral", "short-lived")).unwrap();
        let tag = tags.add_new("adjectives", TagColor::Purple).unwrap();
        words.add_tag(word.id, tag.id).unwrap();
        words.save_context().unwrap();
        provider.process_notifications();
        assert_eq!(provider.items()[0].tags, vec![tag.clone()]);

        words.delete(word.id).unwrap();
        words.save_context().unwrap();
        provider.process_notifications();

        assert!(provider.get(word.id).is_none());
        let links: i64 = store
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM word_tags", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(links, 0);
        // the tag itself survives
        assert_eq!(tags.tags_for(EntryRef::Word(word.id)).unwrap(), vec![]);
        assert!(store.read(|conn| db::get_tag(conn, tag.id)).unwrap().is_some());
    }

    #[test]
    fn test_add_new_creates_exactly_one_word_each_time() {
        let store = test_store();
        let words = WordsManager::new(store.clone());
        let before = Utc::now();

        let mut ids = std::collections::HashSet::new();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let word = words.add_new(NewWord::new(*text, "a number")).unwrap();
            assert!(word.timestamp >= before);
            assert!(ids.insert(word.id));
            assert_eq!(store.read(db::count_words).unwrap(), i as i64 + 1);
        }
    }

    #[test]
    fn test_delete_missing_word() {
        let store = test_store();
        let words = WordsManager::new(store.clone());
        let events = store.subscribe();

        assert!(matches!(
            words.delete(Uuid::new_v4()),
            Err(Error::Internal(InternalError::EntryNotFound(_)))
        ));
        assert!(!store.has_changes());

        words.save_context().unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_update_stores_trimmed_text() {
        let words = WordsManager::new(test_store());
        let mut word = words.add_new(NewWord::new("sonder", "a realization")).unwrap();

        word.text = "  sonder\t".to_string();
        word.definition = " the realization that others have lives ".to_string();
        words.update(&word).unwrap();

        let stored = words.word(word.id).unwrap().unwrap();
        assert_eq!(stored.text, "sonder");
        assert_eq!(stored.definition, "the realization that others have lives");
    }

    #[test]
    fn test_favorite_and_examples() {
        let words = WordsManager::new(test_store());
        let word = words.add_new(NewWord::new("laconic", "using few words")).unwrap();

        assert!(words.toggle_favorite(word.id).unwrap());
        assert!(!words.toggle_favorite(word.id).unwrap());

        words.add_example(word.id, "a laconic reply").unwrap();
        let updated = words.add_example(word.id, "his laconic style").unwrap();
        assert_eq!(updated.examples.len(), 2);

        let updated = words.remove_example(word.id, 0).unwrap();
        assert_eq!(updated.examples, vec!["his laconic style"]);
        assert!(words.add_example(word.id, " ").is_err());
    }

    #[test]
    fn test_add_from_lookup() {
        let words = WordsManager::new(test_store());
        let lookup = FakeLookup(Ok(vec![LookupResult {
            word: "quixotic".to_string(),
            phonetic: Some("/kwɪkˈsɒtɪk/".to_string()),
            part_of_speech: PartOfSpeech::Adjective,
            definition: "exceedingly idealistic".to_string(),
            examples: vec!["a quixotic quest".to_string()],
            audio_url: None,
        }]));

        let word = words.add_from_lookup(&lookup, "quixotic").unwrap();
        assert_eq!(word.part_of_speech, PartOfSpeech::Adjective);
        assert_eq!(word.examples, vec!["a quixotic quest"]);

        let empty = FakeLookup(Ok(Vec::new()));
        assert!(matches!(
            words.add_from_lookup(&empty, "zzzz"),
            Err(Error::Internal(InternalError::DefinitionNotFound(_)))
        ));

        let offline = FakeLookup(Err(NetworkError::NoConnection));
        assert_eq!(
            words.add_from_lookup(&offline, "word").unwrap_err(),
            Error::Network(NetworkError::NoConnection)
        );
    }

    #[test]
    fn test_export_then_import_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.csv");

        let source = WordsManager::new(test_store());
        source.add_new(NewWord::new("alpha", "first, of all")).unwrap();
        source.add_new(NewWord::new("beta", "second")).unwrap();
        source.save_context().unwrap();
        assert_eq!(source.export_csv(&path).unwrap(), 2);

        let target_store = test_store();
        let target = WordsManager::new(target_store.clone());
        let stats = target.import_csv(&path, |_, _| {}).unwrap();
        assert_eq!(stats.words_imported, 2);
        target.save_context().unwrap();

        let again = target.import_csv(&path, |_, _| {}).unwrap();
        assert_eq!(again.words_imported, 0);
        assert_eq!(again.duplicates_skipped, 2);
        assert_eq!(target_store.read(db::count_words).unwrap(), 2);
    }

    #[test]
    fn test_import_missing_file() {
        let words = WordsManager::new(test_store());
        assert!(matches!(
            words.import_csv(Path::new("/nonexistent/words.csv"), |_, _| {}),
            Err(Error::Internal(InternalError::ImportFailed(_)))
        ));
    }
}
