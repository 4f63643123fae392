//! Idiom management

use std::rc::Rc;

use chrono::Utc;
use uuid::Uuid;

use crate::db;
use crate::error::{InternalError, Result};
use crate::models::{EntryRef, Idiom};
use crate::store::PersistentStore;
use crate::tags;
use crate::words::clean_examples;

pub struct IdiomsManager {
    store: Rc<PersistentStore>,
}

impl IdiomsManager {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Create an idiom
    ///
    /// # Arguments
    /// * `idiom` - The idiom itself; trimmed, must be non-empty
    /// * `definition` - Trimmed, must be non-empty
    /// * `examples` - Usage examples; blank ones are dropped
    pub fn add_new(&self, idiom: &str, definition: &str, examples: Vec<String>) -> Result<Idiom> {
        let text = idiom.trim();
        let definition = definition.trim();
        if text.is_empty() || definition.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }

        let idiom = Idiom {
            id: Uuid::new_v4(),
            idiom_itself: text.to_string(),
            definition: definition.to_string(),
            language_code: self.store.config().default_language_code.clone(),
            timestamp: Utc::now(),
            is_favorite: false,
            examples: clean_examples(examples),
            difficulty_score: 0,
            has_been_practiced: false,
            tags: Vec::new(),
        };

        if let Err(e) = self.store.mutate(|conn| db::insert_idiom(conn, &idiom)) {
            log::error!("Saving idiom '{}' failed: {}", idiom.idiom_itself, e);
            return Err(InternalError::SavingIdiomFailed.into());
        }
        Ok(idiom)
    }

    pub fn update(&self, idiom: &Idiom) -> Result<()> {
        let text = idiom.idiom_itself.trim();
        let definition = idiom.definition.trim();
        if text.is_empty() || definition.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        let idiom = Idiom {
            idiom_itself: text.to_string(),
            definition: definition.to_string(),
            ..idiom.clone()
        };

        match self.store.mutate(|conn| db::update_idiom(conn, &idiom)) {
            Ok(true) => Ok(()),
            Ok(false) => Err(InternalError::EntryNotFound(idiom.id.to_string()).into()),
            Err(e) => {
                log::error!("Updating idiom {} failed: {}", idiom.id, e);
                Err(InternalError::SavingIdiomFailed.into())
            }
        }
    }

    pub fn toggle_favorite(&self, idiom_id: Uuid) -> Result<bool> {
        let mut idiom = self.existing(idiom_id)?;
        idiom.is_favorite = !idiom.is_favorite;
        self.update(&idiom)?;
        Ok(idiom.is_favorite)
    }

    pub fn add_example(&self, idiom_id: Uuid, example: &str) -> Result<Idiom> {
        let example = example.trim();
        if example.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        let mut idiom = self.existing(idiom_id)?;
        idiom.examples.push(example.to_string());
        self.update(&idiom)?;
        Ok(idiom)
    }

    pub fn remove_example(&self, idiom_id: Uuid, index: usize) -> Result<Idiom> {
        let mut idiom = self.existing(idiom_id)?;
        if index < idiom.examples.len() {
            idiom.examples.remove(index);
            self.update(&idiom)?;
        }
        Ok(idiom)
    }

    pub fn add_tag(&self, idiom_id: Uuid, tag_id: Uuid) -> Result<()> {
        tags::assign_tag(&self.store, &EntryRef::Idiom(idiom_id), tag_id).map(|_| ())
    }

    pub fn remove_tag(&self, idiom_id: Uuid, tag_id: Uuid) -> Result<()> {
        tags::unassign_tag(&self.store, &EntryRef::Idiom(idiom_id), tag_id).map(|_| ())
    }

    pub fn delete(&self, idiom_id: Uuid) -> Result<()> {
        match self.store.mutate(|conn| db::delete_idiom(conn, idiom_id)) {
            Ok(true) => Ok(()),
            Ok(false) => Err(InternalError::EntryNotFound(idiom_id.to_string()).into()),
            Err(e) => {
                log::error!("Deleting idiom {} failed: {}", idiom_id, e);
                Err(InternalError::DeletingIdiomFailed.into())
            }
        }
    }

    pub fn idiom(&self, idiom_id: Uuid) -> Result<Option<Idiom>> {
        Ok(self.store.read(|conn| db::get_idiom(conn, idiom_id))?)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }

    fn existing(&self, idiom_id: Uuid) -> Result<Idiom> {
        self.idiom(idiom_id)?
            .ok_or_else(|| InternalError::EntryNotFound(idiom_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::Error;
    use crate::models::TagColor;
    use crate::provider::IdiomsProvider;
    use crate::tags::TagManager;

    fn test_store() -> Rc<PersistentStore> {
        let config = StoreConfig {
            debounce_ms: 0,
            ..StoreConfig::default()
        };
        Rc::new(PersistentStore::open_in_memory(config).unwrap())
    }

    #[test]
    fn test_add_and_publish() {
        let store = test_store();
        let idioms = IdiomsManager::new(store.clone());
        let mut provider = IdiomsProvider::new(store);

        let idiom = idioms
            .add_new(
                "break the ice",
                "to start a conversation",
                vec!["He told a joke to break the ice.".to_string(), "  ".to_string()],
            )
            .unwrap();
        idioms.save_context().unwrap();
        provider.process_notifications();

        assert_eq!(idiom.examples.len(), 1);
        assert_eq!(provider.items(), &[idiom][..]);
    }

    #[test]
    fn test_add_new_creates_distinct_idioms() {
        let store = test_store();
        let idioms = IdiomsManager::new(store.clone());
        let before = Utc::now();

        let first = idioms.add_new("piece of cake", "very easy", Vec::new()).unwrap();
        let second = idioms.add_new("piece of cake", "very easy", Vec::new()).unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.timestamp >= before && second.timestamp >= before);
        assert_eq!(store.read(db::count_idioms).unwrap(), 2);
    }

    #[test]
    fn test_empty_input() {
        let store = test_store();
        let idioms = IdiomsManager::new(store.clone());
        assert_eq!(
            idioms.add_new(" ", "meaning", Vec::new()).unwrap_err(),
            Error::Internal(InternalError::InputCannotBeEmpty)
        );
        assert!(!store.has_changes());
    }

    #[test]
    fn test_edit_and_delete() {
        let store = test_store();
        let idioms = IdiomsManager::new(store.clone());
        let tags = TagManager::new(store.clone());
        let idiom = idioms.add_new("spill the beans", "reveal a secret", Vec::new()).unwrap();
        let tag = tags.add_new("informal", TagColor::Yellow).unwrap();

        idioms.add_tag(idiom.id, tag.id).unwrap();
        assert!(idioms.toggle_favorite(idiom.id).unwrap());
        idioms.add_example(idiom.id, "Who spilled the beans?").unwrap();
        idioms.save_context().unwrap();

        let stored = idioms.idiom(idiom.id).unwrap().unwrap();
        assert!(stored.is_favorite);
        assert_eq!(stored.tags, vec![tag.clone()]);

        idioms.remove_tag(idiom.id, tag.id).unwrap();
        idioms.delete(idiom.id).unwrap();
        idioms.save_context().unwrap();
        assert!(idioms.idiom(idiom.id).unwrap().is_none());
        assert!(matches!(
            idioms.delete(idiom.id),
            Err(Error::Internal(InternalError::EntryNotFound(_)))
        ));
    }
}
