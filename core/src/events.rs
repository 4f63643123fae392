//! Store change notifications
//!
//! The store reports every successful save or remote merge to a
//! [`ChangeNotifier`]. The notifier coalesces bursts inside a debounce window
//! on a background thread and then broadcasts one [`StoreEvent`] to every
//! subscriber channel. A zero window broadcasts synchronously.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A save on this device
    Local,
    /// A merge of changes received from the cloud
    Remote,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    DataUpdated {
        local: bool,
        remote: bool,
        /// Number of raw changes folded into this event
        coalesced: usize,
    },
}

impl StoreEvent {
    fn from_origins(local: bool, remote: bool, coalesced: usize) -> Self {
        StoreEvent::DataUpdated {
            local,
            remote,
            coalesced,
        }
    }
}

type Subscribers = Arc<Mutex<Vec<Sender<StoreEvent>>>>;

/// Debounced broadcaster of store change events
pub struct ChangeNotifier {
    subscribers: Subscribers,
    raw_tx: Option<Sender<ChangeOrigin>>,
    debounce_handle: Option<thread::JoinHandle<()>>,
}

impl ChangeNotifier {
    /// Create a notifier with the given debounce window
    pub fn new(debounce: Duration) -> Self {
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));

        if debounce.is_zero() {
            return Self {
                subscribers,
                raw_tx: None,
                debounce_handle: None,
            };
        }

        let (raw_tx, raw_rx) = mpsc::channel();
        let thread_subscribers = subscribers.clone();
        let handle = thread::Builder::new()
            .name("lexicon-notifier".to_string())
            .spawn(move || debounce_loop(raw_rx, thread_subscribers, debounce));

        match handle {
            Ok(handle) => Self {
                subscribers,
                raw_tx: Some(raw_tx),
                debounce_handle: Some(handle),
            },
            Err(e) => {
                log::warn!("Cannot spawn notifier thread, delivering synchronously: {}", e);
                Self {
                    subscribers,
                    raw_tx: None,
                    debounce_handle: None,
                }
            }
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Report one change
    pub fn notify(&self, origin: ChangeOrigin) {
        match &self.raw_tx {
            Some(tx) => {
                if tx.send(origin).is_err() {
                    log::warn!("Notifier thread is gone, dropping {:?} change", origin);
                }
            }
            None => {
                let event = match origin {
                    ChangeOrigin::Local => StoreEvent::from_origins(true, false, 1),
                    ChangeOrigin::Remote => StoreEvent::from_origins(false, true, 1),
                };
                broadcast(&self.subscribers, event);
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        // Closing the raw channel makes the loop flush and exit.
        self.raw_tx.take();
        if let Some(handle) = self.debounce_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Accumulates raw changes until the debounce window has passed
/// since the last one.
#[derive(Default)]
struct Pending {
    local: bool,
    remote: bool,
    count: usize,
    last: Option<Instant>,
}

impl Pending {
    fn add(&mut self, origin: ChangeOrigin) {
        match origin {
            ChangeOrigin::Local => self.local = true,
            ChangeOrigin::Remote => self.remote = true,
        }
        self.count += 1;
        self.last = Some(Instant::now());
    }

    fn take_event(&mut self) -> Option<StoreEvent> {
        if self.count == 0 {
            return None;
        }
        let event = StoreEvent::from_origins(self.local, self.remote, self.count);
        *self = Pending::default();
        Some(event)
    }
}

fn debounce_loop(rx: Receiver<ChangeOrigin>, subscribers: Subscribers, debounce: Duration) {
    let mut pending = Pending::default();

    loop {
        let timeout = match pending.last {
            Some(last) => debounce.saturating_sub(last.elapsed()),
            None => Duration::from_secs(60),
        };

        match rx.recv_timeout(timeout) {
            Ok(origin) => pending.add(origin),
            Err(RecvTimeoutError::Timeout) => {
                let due = pending
                    .last
                    .map(|last| last.elapsed() >= debounce)
                    .unwrap_or(false);
                if due {
                    if let Some(event) = pending.take_event() {
                        broadcast(&subscribers, event);
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(event) = pending.take_event() {
                    broadcast(&subscribers, event);
                }
                break;
            }
        }
    }
}

/// Send to every subscriber, dropping the ones whose receiver is gone
fn broadcast(subscribers: &Subscribers, event: StoreEvent) {
    let mut subs = lock(subscribers);
    subs.retain(|tx| tx.send(event).is_ok());
    log::debug!("Broadcast {:?} to {} subscribers", event, subs.len());
}

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<Sender<StoreEvent>>> {
    subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
