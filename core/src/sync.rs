//! Cloud sync bridge
//!
//! Platform sync clients listen on their own threads and hand batches of
//! [`RemoteChange`]s to a [`SyncBridge`] through a channel. The bridge merges
//! them on the store's thread: the remote version wins, the merge is saved
//! at once, and subscribers see a `DataUpdated` event with the remote flag.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::models::{EntryRef, Idiom, Tag, Word};
use crate::store::PersistentStore;

/// One change received from the cloud
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Insert or overwrite a word; its `tags` replace the local links
    UpsertWord(Word),
    DeleteWord(Uuid),
    UpsertIdiom(Idiom),
    DeleteIdiom(Uuid),
    UpsertTag(Tag),
    DeleteTag(Uuid),
}

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub upserted: usize,
    pub deleted: usize,
    /// Deletes of entities that were not stored
    pub skipped: usize,
}

pub struct SyncBridge {
    store: Rc<PersistentStore>,
    tx: Sender<Vec<RemoteChange>>,
    rx: Receiver<Vec<RemoteChange>>,
    /// Changes from a pump whose merge failed; retried first on the next one
    unmerged: RefCell<Vec<RemoteChange>>,
}

impl SyncBridge {
    pub fn new(store: Rc<PersistentStore>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            tx,
            rx,
            unmerged: RefCell::new(Vec::new()),
        }
    }

    /// Handle for queueing batches from any thread
    pub fn sender(&self) -> Sender<Vec<RemoteChange>> {
        self.tx.clone()
    }

    /// Merge every queued batch
    ///
    /// When the merge fails the drained changes are kept, in order, and
    /// merged again ahead of newer batches on the next call.
    pub fn pump(&self) -> Result<MergeReport> {
        let mut batch = self.unmerged.take();
        batch.extend(self.rx.try_iter().flatten());

        match self.merge_batch(&batch) {
            Ok(report) => Ok(report),
            Err(e) => {
                log::warn!("Keeping {} remote changes for the next pump", batch.len());
                self.unmerged.replace(batch);
                Err(e)
            }
        }
    }

    /// Number of changes waiting for a retry after a failed pump
    pub fn unmerged_len(&self) -> usize {
        self.unmerged.borrow().len()
    }

    /// Merge a batch and save it
    ///
    /// Pending local changes are saved first so the merge commits alone.
    /// If any change fails, the whole batch is rolled back.
    pub fn apply(&self, batch: Vec<RemoteChange>) -> Result<MergeReport> {
        self.merge_batch(&batch)
    }

    fn merge_batch(&self, batch: &[RemoteChange]) -> Result<MergeReport> {
        if batch.is_empty() {
            return Ok(MergeReport::default());
        }
        if self.store.has_changes() {
            self.store.save_context()?;
        }

        let report = match self.store.mutate(|conn| merge(conn, batch)) {
            Ok(report) => report,
            Err(e) => {
                log::error!("Merging {} remote changes failed: {}", batch.len(), e);
                self.store.rollback()?;
                return Err(e.into());
            }
        };
        self.store.save_merged()?;

        log::info!(
            "Merged remote changes: {} upserted, {} deleted, {} skipped",
            report.upserted,
            report.deleted,
            report.skipped
        );
        Ok(report)
    }
}

fn merge(conn: &Connection, batch: &[RemoteChange]) -> rusqlite::Result<MergeReport> {
    let mut report = MergeReport::default();

    for change in batch {
        match change {
            RemoteChange::UpsertWord(word) => {
                db::upsert_word(conn, word)?;
                relink(conn, &EntryRef::Word(word.id), &word.tags)?;
                report.upserted += 1;
            }
            RemoteChange::UpsertIdiom(idiom) => {
                db::upsert_idiom(conn, idiom)?;
                relink(conn, &EntryRef::Idiom(idiom.id), &idiom.tags)?;
                report.upserted += 1;
            }
            RemoteChange::UpsertTag(tag) => {
                merge_tag(conn, tag)?;
                report.upserted += 1;
            }
            RemoteChange::DeleteWord(id) => count_delete(&mut report, db::delete_word(conn, *id)?),
            RemoteChange::DeleteIdiom(id) => {
                count_delete(&mut report, db::delete_idiom(conn, *id)?)
            }
            RemoteChange::DeleteTag(id) => count_delete(&mut report, db::delete_tag(conn, *id)?),
        }
    }
    Ok(report)
}

fn count_delete(report: &mut MergeReport, deleted: bool) {
    if deleted {
        report.deleted += 1;
    } else {
        report.skipped += 1;
    }
}

/// Make the entry's tag links match `tags` exactly
fn relink(conn: &Connection, entry: &EntryRef, tags: &[Tag]) -> rusqlite::Result<()> {
    db::clear_tags(conn, entry)?;
    for tag in tags {
        merge_tag(conn, tag)?;
        db::attach_tag(conn, entry, tag.id)?;
    }
    Ok(())
}

/// Upsert a remote tag; a local tag with the same name is folded into it
fn merge_tag(conn: &Connection, tag: &Tag) -> rusqlite::Result<()> {
    match db::find_tag_by_name(conn, &tag.name)? {
        Some(local) if local.id != tag.id => {
            log::debug!("Remote tag '{}' replaces local {}", tag.name, local.id);
            db::replace_tag(conn, local.id, tag)
        }
        _ => db::upsert_tag(conn, tag),
    }
}
