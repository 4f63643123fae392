//! Shared dictionaries
//!
//! Local cache of dictionaries hosted in the cloud and shared between users.
//! Every operation runs as one user; viewing needs view permission, changing
//! words needs edit permission, and membership is managed by the owner.

use std::rc::Rc;

use chrono::Utc;
use uuid::Uuid;

use crate::db;
use crate::error::{InternalError, Result, ValidationError};
use crate::models::{Collaborator, CollaboratorRole, PartOfSpeech, SharedDictionary, SharedWord};
use crate::store::PersistentStore;
use crate::words::{clean_examples, NewWord};

pub struct SharedDictionaryManager {
    store: Rc<PersistentStore>,
    user_id: String,
}

impl SharedDictionaryManager {
    /// # Arguments
    /// * `store` - The local store
    /// * `user_id` - Signed-in user all permission checks run as
    pub fn new(store: Rc<PersistentStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Create a dictionary owned by the current user
    pub fn create_dictionary(&self, name: &str, is_public: bool) -> Result<SharedDictionary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        let dict = SharedDictionary {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner_id: self.user_id.clone(),
            collaborators: Vec::new(),
            created_at: Utc::now(),
            is_public,
        };
        self.store
            .mutate(|conn| db::upsert_shared_dictionary(conn, &dict))?;
        Ok(dict)
    }

    /// Cache a dictionary received from the cloud
    pub fn upsert_dictionary(&self, dict: &SharedDictionary) -> Result<()> {
        if dict.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()).into());
        }
        if dict.owner_id.is_empty() {
            return Err(ValidationError::MissingField("ownerId".to_string()).into());
        }
        self.store
            .mutate(|conn| db::upsert_shared_dictionary(conn, dict))?;
        Ok(())
    }

    /// Delete a dictionary and its words; owner only
    pub fn remove_dictionary(&self, dict_id: &str) -> Result<()> {
        self.owned(dict_id)?;
        self.store
            .mutate(|conn| db::delete_shared_dictionary(conn, dict_id))?;
        Ok(())
    }

    /// Dictionaries the current user may view
    pub fn dictionaries(&self) -> Result<Vec<SharedDictionary>> {
        let all = self.store.read(db::list_shared_dictionaries)?;
        Ok(all
            .into_iter()
            .filter(|d| d.can_view(&self.user_id))
            .collect())
    }

    /// Grant or change a collaborator's role; owner only
    pub fn set_collaborator(
        &self,
        dict_id: &str,
        user_id: &str,
        role: CollaboratorRole,
    ) -> Result<SharedDictionary> {
        let mut dict = self.owned(dict_id)?;
        match dict.collaborators.iter_mut().find(|c| c.user_id == user_id) {
            Some(existing) => existing.role = role,
            None => dict.collaborators.push(Collaborator {
                user_id: user_id.to_string(),
                role,
            }),
        }
        self.store
            .mutate(|conn| db::upsert_shared_dictionary(conn, &dict))?;
        Ok(dict)
    }

    pub fn remove_collaborator(&self, dict_id: &str, user_id: &str) -> Result<SharedDictionary> {
        let mut dict = self.owned(dict_id)?;
        dict.collaborators.retain(|c| c.user_id != user_id);
        self.store
            .mutate(|conn| db::upsert_shared_dictionary(conn, &dict))?;
        Ok(dict)
    }

    /// Add a word to a dictionary the current user may edit
    pub fn add_word(&self, dict_id: &str, input: NewWord) -> Result<SharedWord> {
        let text = input.text.trim();
        let definition = input.definition.trim();
        if text.is_empty() || definition.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        self.editable(dict_id)?;

        let word = SharedWord {
            dictionary_id: dict_id.to_string(),
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            definition: definition.to_string(),
            part_of_speech: input.part_of_speech.unwrap_or(PartOfSpeech::Unknown),
            phonetic: input.phonetic.filter(|p| !p.trim().is_empty()),
            examples: clean_examples(input.examples),
            added_by: self.user_id.clone(),
            timestamp: Utc::now(),
        };
        self.store.mutate(|conn| db::upsert_shared_word(conn, &word))?;
        Ok(word)
    }

    pub fn update_word(&self, word: &SharedWord) -> Result<()> {
        if word.text.trim().is_empty() || word.definition.trim().is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        self.editable(&word.dictionary_id)?;
        self.store.mutate(|conn| db::upsert_shared_word(conn, word))?;
        Ok(())
    }

    pub fn delete_word(&self, dict_id: &str, word_id: &str) -> Result<()> {
        self.editable(dict_id)?;
        if !self
            .store
            .mutate(|conn| db::delete_shared_word(conn, dict_id, word_id))?
        {
            return Err(InternalError::EntryNotFound(word_id.to_string()).into());
        }
        Ok(())
    }

    /// Words of a dictionary the current user may view, newest first
    pub fn words_in(&self, dict_id: &str) -> Result<Vec<SharedWord>> {
        let dict = self.dictionary(dict_id)?;
        if !dict.can_view(&self.user_id) {
            return Err(InternalError::SharedDictionaryAccessDenied.into());
        }
        Ok(self.store.read(|conn| db::list_shared_words(conn, dict_id))?)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }

    fn dictionary(&self, dict_id: &str) -> Result<SharedDictionary> {
        self.store
            .read(|conn| db::get_shared_dictionary(conn, dict_id))?
            .ok_or_else(|| InternalError::EntryNotFound(dict_id.to_string()).into())
    }

    fn editable(&self, dict_id: &str) -> Result<SharedDictionary> {
        let dict = self.dictionary(dict_id)?;
        if !dict.can_edit(&self.user_id) {
            log::warn!("User {} may not edit dictionary {}", self.user_id, dict_id);
            return Err(InternalError::SharedDictionaryAccessDenied.into());
        }
        Ok(dict)
    }

    fn owned(&self, dict_id: &str) -> Result<SharedDictionary> {
        let dict = self.dictionary(dict_id)?;
        if dict.owner_id != self.user_id {
            return Err(InternalError::SharedDictionaryAccessDenied.into());
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::Error;

    fn test_store() -> Rc<PersistentStore> {
        let config = StoreConfig {
            debounce_ms: 0,
            ..StoreConfig::default()
        };
        Rc::new(PersistentStore::open_in_memory(config).unwrap())
    }

    fn denied<T: std::fmt::Debug>(result: Result<T>) -> bool {
        matches!(
            result,
            Err(Error::Internal(InternalError::SharedDictionaryAccessDenied))
        )
    }

    #[test]
    fn test_permissions() {
        let store = test_store();
        let alice = SharedDictionaryManager::new(store.clone(), "alice");
        let bob = SharedDictionaryManager::new(store.clone(), "bob");
        let carol = SharedDictionaryManager::new(store, "carol");

        let dict = alice.create_dictionary("Travel", false).unwrap();
        alice
            .set_collaborator(&dict.id, "bob", CollaboratorRole::Viewer)
            .unwrap();

        let word = alice.add_word(&dict.id, NewWord::new("passport", "travel document")).unwrap();
        assert_eq!(word.added_by, "alice");

        assert_eq!(bob.words_in(&dict.id).unwrap().len(), 1);
        assert!(denied(bob.add_word(&dict.id, NewWord::new("visa", "permit"))));
        assert!(denied(carol.words_in(&dict.id)));
        assert!(carol.dictionaries().unwrap().is_empty());

        alice
            .set_collaborator(&dict.id, "bob", CollaboratorRole::Editor)
            .unwrap();
        bob.add_word(&dict.id, NewWord::new("visa", "permit")).unwrap();
        assert!(denied(bob.remove_dictionary(&dict.id)));
        assert!(denied(bob.set_collaborator(&dict.id, "carol", CollaboratorRole::Editor)));

        alice.remove_collaborator(&dict.id, "bob").unwrap();
        assert!(denied(bob.delete_word(&dict.id, &word.id)));
    }

    #[test]
    fn test_public_dictionary_is_viewable() {
        let store = test_store();
        let owner = SharedDictionaryManager::new(store.clone(), "owner");
        let stranger = SharedDictionaryManager::new(store, "stranger");

        let dict = owner.create_dictionary("Open", true).unwrap();
        assert_eq!(stranger.dictionaries().unwrap(), vec![dict.clone()]);
        assert!(stranger.words_in(&dict.id).unwrap().is_empty());
        assert!(denied(stranger.add_word(&dict.id, NewWord::new("w", "d"))));
    }

    #[test]
    fn test_remove_dictionary_drops_words() {
        let store = test_store();
        let owner = SharedDictionaryManager::new(store.clone(), "owner");
        let dict = owner.create_dictionary("Temp", false).unwrap();
        let word = owner.add_word(&dict.id, NewWord::new("w", "d")).unwrap();
        owner.save_context().unwrap();

        owner.remove_dictionary(&dict.id).unwrap();
        assert!(matches!(
            owner.words_in(&dict.id),
            Err(Error::Internal(InternalError::EntryNotFound(_)))
        ));
        assert!(matches!(
            owner.delete_word(&dict.id, &word.id),
            Err(Error::Internal(InternalError::EntryNotFound(_)))
        ));
        let count: i64 = store
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM shared_words", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_upsert_validates() {
        let manager = SharedDictionaryManager::new(test_store(), "me");
        let dict = SharedDictionary {
            id: String::new(),
            name: "x".to_string(),
            owner_id: "me".to_string(),
            collaborators: Vec::new(),
            created_at: Utc::now(),
            is_public: false,
        };
        assert!(matches!(
            manager.upsert_dictionary(&dict),
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));
    }
}
