//! # Signals
//!
//! A small broadcast bus the store publishes entity lifecycle signals on.
//!
//! Removals are also delivered to [`RemovalWatch`]es directly, outside the
//! bounded broadcast buffer. A watch registers when the dispatcher starts a
//! removal-watched call and deregisters when it is dropped, so a removal can
//! never be evicted by later traffic on the bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    EntityCreated {
        path: String,
        owner: Option<String>,
        trace_id: Option<String>,
    },
    EntityRemoved {
        path: String,
    },
}

#[derive(Debug, Default)]
struct Watchers {
    next_id: u64,
    active: HashMap<u64, (String, Arc<AtomicBool>)>,
}

#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
    watchers: Arc<Mutex<Watchers>>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            watchers: Arc::default(),
        }
    }

    fn watchers(&self) -> MutexGuard<'_, Watchers> {
        self.watchers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes to current subscribers. Nobody listening is fine.
    pub fn emit(&self, signal: Signal) {
        if let Signal::EntityRemoved { path } = &signal {
            self.watchers()
                .active
                .values()
                .filter(|(watched, _)| watched == path)
                .for_each(|(_, removed)| removed.store(true, Ordering::SeqCst));
        }
        debug!(?signal, receivers = self.sender.receiver_count(), "Emit");
        let _ = self.sender.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Watches for removal of `path` until the returned watch is dropped.
    pub fn watch_removal(&self, path: impl Into<String>) -> RemovalWatch {
        let path = path.into();
        let removed = Arc::new(AtomicBool::new(false));
        let mut watchers = self.watchers();
        let id = watchers.next_id;
        watchers.next_id += 1;
        watchers
            .active
            .insert(id, (path.clone(), Arc::clone(&removed)));
        RemovalWatch {
            id,
            path,
            removed,
            watchers: Arc::clone(&self.watchers),
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Registration used to stop queued plugin invocations once the entity a call
/// is about has been removed.
#[derive(Debug)]
pub struct RemovalWatch {
    id: u64,
    path: String,
    removed: Arc<AtomicBool>,
    watchers: Arc<Mutex<Watchers>>,
}

impl RemovalWatch {
    /// Whether the watched path was removed since the watch started.
    pub fn removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for RemovalWatch {
    fn drop(&mut self) {
        let mut watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        watchers.active.remove(&self.id);
    }
}
