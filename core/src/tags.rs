//! Tag management
//!
//! Tag names are unique ignoring case. An entry holds at most
//! `StoreConfig::max_tags_per_entry` tags.

use std::rc::Rc;

use chrono::Utc;
use uuid::Uuid;

use crate::db;
use crate::error::{InternalError, Result};
use crate::models::{EntryRef, Tag, TagColor};
use crate::store::PersistentStore;

pub struct TagManager {
    store: Rc<PersistentStore>,
}

impl TagManager {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Create a tag
    ///
    /// # Arguments
    /// * `name` - Display name, trimmed; must be non-empty and unused
    /// * `color` - Palette color
    pub fn add_new(&self, name: &str, color: TagColor) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        self.ensure_name_free(name, None)?;

        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color,
            timestamp: Utc::now(),
        };
        self.store.mutate(|conn| db::insert_tag(conn, &tag))?;
        log::debug!("Added tag '{}' ({})", tag.name, tag.id);
        Ok(tag)
    }

    pub fn rename(&self, tag_id: Uuid, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InternalError::InputCannotBeEmpty.into());
        }
        self.ensure_name_free(name, Some(tag_id))?;

        let mut tag = self.existing(tag_id)?;
        tag.name = name.to_string();
        self.store.mutate(|conn| db::update_tag(conn, &tag))?;
        Ok(tag)
    }

    pub fn recolor(&self, tag_id: Uuid, color: TagColor) -> Result<Tag> {
        let mut tag = self.existing(tag_id)?;
        tag.color = color;
        self.store.mutate(|conn| db::update_tag(conn, &tag))?;
        Ok(tag)
    }

    /// Delete a tag; it is removed from every entry that carried it
    pub fn delete(&self, tag_id: Uuid) -> Result<()> {
        if !self.store.mutate(|conn| db::delete_tag(conn, tag_id))? {
            return Err(InternalError::EntryNotFound(tag_id.to_string()).into());
        }
        Ok(())
    }

    /// Attach a tag to a word or idiom
    pub fn assign(&self, entry: EntryRef, tag_id: Uuid) -> Result<()> {
        assign_tag(&self.store, &entry, tag_id).map(|_| ())
    }

    pub fn unassign(&self, entry: EntryRef, tag_id: Uuid) -> Result<()> {
        unassign_tag(&self.store, &entry, tag_id).map(|_| ())
    }

    pub fn tags_for(&self, entry: EntryRef) -> Result<Vec<Tag>> {
        Ok(self.store.read(|conn| db::tags_for_entry(conn, &entry))?)
    }

    pub fn save_context(&self) -> Result<()> {
        Ok(self.store.save_context()?)
    }

    fn existing(&self, tag_id: Uuid) -> Result<Tag> {
        self.store
            .read(|conn| db::get_tag(conn, tag_id))?
            .ok_or_else(|| InternalError::EntryNotFound(tag_id.to_string()).into())
    }

    fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<()> {
        match self.store.read(|conn| db::find_tag_by_name(conn, name))? {
            Some(found) if Some(found.id) != except => {
                Err(InternalError::TagAlreadyExists(found.name).into())
            }
            _ => Ok(()),
        }
    }
}

/// Link a tag to an entry, enforcing the per-entry limit
///
/// Returns false when the tag was already linked.
pub(crate) fn assign_tag(store: &PersistentStore, entry: &EntryRef, tag_id: Uuid) -> Result<bool> {
    if !store.read(|conn| db::entry_exists(conn, entry))? {
        return Err(InternalError::EntryNotFound(entry.id().to_string()).into());
    }
    if store.read(|conn| db::get_tag(conn, tag_id))?.is_none() {
        return Err(InternalError::EntryNotFound(tag_id.to_string()).into());
    }

    let current = store.read(|conn| db::tags_for_entry(conn, entry))?;
    if current.iter().any(|t| t.id == tag_id) {
        return Ok(false);
    }
    let limit = store.config().max_tags_per_entry;
    if current.len() >= limit {
        return Err(InternalError::TagLimitReached(limit).into());
    }

    Ok(store.mutate(|conn| db::attach_tag(conn, entry, tag_id))?)
}

/// Remove a tag link; returns false when there was none
pub(crate) fn unassign_tag(
    store: &PersistentStore,
    entry: &EntryRef,
    tag_id: Uuid,
) -> Result<bool> {
    Ok(store.mutate(|conn| db::detach_tag(conn, entry, tag_id))?)
}
