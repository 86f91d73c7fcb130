//! A thread-safe, insertion-ordered collection with copy-on-write
//! iteration and a change notification, the shape [`ToolCollection`],
//! [`PromptCollection`], and [`ResourceCollection`] all share.
//!
//! Writers take a short-lived lock and publish a fresh `Arc<Vec<_>>`
//! snapshot; readers never block on a writer and see a consistent view
//! even if a mutation lands mid-iteration.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' not found")]
    NotFound(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Anything storable in a [`Collection`] has a stable string key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Emits one unit value on every mutation. Subscribers that lag behind
/// the channel's capacity simply miss individual ticks — correctness
/// only requires "at least one signal per change", not delivery of
/// every tick, so a lagged receiver re-syncs on its next recv.
pub struct Collection<T> {
    snapshot: ArcSwap<Vec<Arc<T>>>,
    write_lock: Mutex<()>,
    changed: broadcast::Sender<()>,
}

impl<T: Keyed> Collection<T> {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(16);
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            changed,
        }
    }

    /// Subscribe to change notifications. Safe to drop the receiver; a
    /// collection with no subscribers still mutates normally.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    pub fn add(&self, item: T) -> RegistryResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load();
        if current.iter().any(|existing| existing.key() == item.key()) {
            return Err(RegistryError::AlreadyExists(item.key().to_string()));
        }
        let mut next = (**current).clone();
        next.push(Arc::new(item));
        self.snapshot.store(Arc::new(next));
        let _ = self.changed.send(());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> RegistryResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load();
        if !current.iter().any(|existing| existing.key() == key) {
            return Err(RegistryError::NotFound(key.to_string()));
        }
        let next: Vec<Arc<T>> = current
            .iter()
            .filter(|existing| existing.key() != key)
            .cloned()
            .collect();
        self.snapshot.store(Arc::new(next));
        let _ = self.changed.send(());
        Ok(())
    }

    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        if self.snapshot.load().is_empty() {
            return;
        }
        self.snapshot.store(Arc::new(Vec::new()));
        let _ = self.changed.send(());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot.load().iter().any(|item| item.key() == key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.snapshot
            .load()
            .iter()
            .find(|item| item.key() == key)
            .cloned()
    }

    /// A consistent, insertion-ordered snapshot safe to iterate while
    /// concurrent writers mutate the collection.
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Keyed> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}
