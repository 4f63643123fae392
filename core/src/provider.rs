//! Providers: cached, observable lists of entities
//!
//! A provider performs an initial fetch when constructed and re-fetches the
//! whole list whenever the store reports a change. Fetch failures never
//! reach the caller; they are published on a separate error channel and the
//! last good snapshot stays in place.

use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::StorageError;
use crate::events::StoreEvent;
use crate::models::{Idiom, Tag, Word};
use crate::store::PersistentStore;

/// An entity type a provider can list
pub trait Listable: Clone {
    /// Name used in log messages
    const NAME: &'static str;

    fn fetch_all(conn: &Connection) -> rusqlite::Result<Vec<Self>>;

    fn id(&self) -> Uuid;
}

impl Listable for Word {
    const NAME: &'static str = "words";

    fn fetch_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        db::list_words(conn)
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Listable for Idiom {
    const NAME: &'static str = "idioms";

    fn fetch_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        db::list_idioms(conn)
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Listable for Tag {
    const NAME: &'static str = "tags";

    fn fetch_all(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        db::list_tags(conn)
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A published list; shared between the provider and its subscribers
pub type Snapshot<E> = Rc<Vec<E>>;

/// Where a provider is in its fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Nothing has been published yet
    Idle,
    Fetching,
    /// A snapshot is available
    Published,
}

/// Cached list of one entity type
pub struct Provider<E: Listable> {
    store: Rc<PersistentStore>,
    events: Receiver<StoreEvent>,
    items: Snapshot<E>,
    state: ProviderState,
    subscribers: Vec<Sender<Snapshot<E>>>,
    error_subscribers: Vec<Sender<StorageError>>,
}

pub type WordsProvider = Provider<Word>;
pub type IdiomsProvider = Provider<Idiom>;
pub type TagsProvider = Provider<Tag>;

impl<E: Listable> Provider<E> {
    /// Subscribe to the store and perform the initial fetch
    pub fn new(store: Rc<PersistentStore>) -> Self {
        let events = store.subscribe();
        let mut provider = Self {
            store,
            events,
            items: Rc::new(Vec::new()),
            state: ProviderState::Idle,
            subscribers: Vec::new(),
            error_subscribers: Vec::new(),
        };
        provider.fetch();
        provider
    }

    /// Re-run the query and publish the result
    ///
    /// On failure the error goes to the error channel and the previous
    /// snapshot is kept.
    pub fn fetch(&mut self) {
        let previous = self.state;
        self.state = ProviderState::Fetching;

        match self.store.read(E::fetch_all) {
            Ok(items) => {
                log::debug!("Fetched {} {}", items.len(), E::NAME);
                self.items = Rc::new(items);
                self.state = ProviderState::Published;
                self.publish();
            }
            Err(e) => {
                log::warn!("Fetching {} failed: {}", E::NAME, e);
                self.state = previous;
                self.error_subscribers.retain(|tx| tx.send(e.clone()).is_ok());
            }
        }
    }

    /// Re-fetch once if the store reported changes since the last call
    ///
    /// Returns whether a fetch happened. Call this from the thread that owns
    /// the store, e.g. on each run-loop tick.
    pub fn process_notifications(&mut self) -> bool {
        let mut changed = false;
        while let Ok(StoreEvent::DataUpdated { .. }) = self.events.try_recv() {
            changed = true;
        }
        if changed {
            self.fetch();
        }
        changed
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&mut self) -> Receiver<Snapshot<E>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Receive fetch failures
    pub fn errors(&mut self) -> Receiver<StorageError> {
        let (tx, rx) = mpsc::channel();
        self.error_subscribers.push(tx);
        rx
    }

    /// Current snapshot
    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn snapshot(&self) -> Snapshot<E> {
        self.items.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    fn publish(&mut self) {
        let snapshot = self.items.clone();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}
