//! Scoped store handles.
//!
//! A [`StoreHandle`] owns one session for a bounded lifetime and releases it
//! when dropped, on every exit path.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::{StoreConnector, StoreSession};

/// The effective connection string handed to the store layer.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreOptions {
    connection_string: String,
}

impl StoreOptions {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

// Connection strings may carry credentials.
impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions").finish_non_exhaustive()
    }
}

/// Opens [`StoreHandle`]s and tracks how many are alive.
pub struct StoreFactory {
    connector: Arc<dyn StoreConnector>,
    options: StoreOptions,
    open: Arc<AtomicUsize>,
}

impl StoreFactory {
    pub fn new(connector: Arc<dyn StoreConnector>, options: StoreOptions) -> Self {
        Self {
            connector,
            options,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Acquire a handle. It is released when dropped.
    pub fn acquire(&self) -> StoreResult<StoreHandle> {
        let session = self.connector.connect(self.options.connection_string())?;
        let id = Uuid::new_v4();
        self.open.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(handle = %id, "Store handle acquired");
        Ok(StoreHandle {
            id,
            session: Mutex::new(session),
            open: self.open.clone(),
        })
    }

    /// Handles acquired from this factory and not yet released.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}

/// A bounded-lifetime handle to the store.
pub struct StoreHandle {
    id: Uuid,
    session: Mutex<Box<dyn StoreSession>>,
    open: Arc<AtomicUsize>,
}

impl StoreHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run `f` against the underlying session.
    pub fn with_session<R>(
        &self,
        f: impl FnOnce(&mut dyn StoreSession) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut session = self.session.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut **session)
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle").field("id", &self.id).finish()
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(handle = %self.id, "Store handle released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;

    #[test]
    fn test_handles_released_on_drop() {
        let store = InMemoryStore::new();
        let factory = StoreFactory::new(Arc::new(store.clone()), StoreOptions::new("Server=s;Database=App"));

        let first = factory.acquire().unwrap();
        let second = factory.acquire().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(factory.open_handles(), 2);

        drop(first);
        assert_eq!(factory.open_handles(), 1);
        drop(second);
        assert_eq!(factory.open_handles(), 0);
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn test_failed_acquire_leaks_nothing() {
        let store = InMemoryStore::new();
        store.set_reachable(false);
        let factory = StoreFactory::new(Arc::new(store), StoreOptions::new("Server=s;Database=App"));

        assert!(factory.acquire().is_err());
        assert_eq!(factory.open_handles(), 0);
    }

    #[test]
    fn test_options_debug_hides_connection_string() {
        let options = StoreOptions::new("Server=s;Password=secret");
        assert!(!format!("{options:?}").contains("secret"));
    }
}
