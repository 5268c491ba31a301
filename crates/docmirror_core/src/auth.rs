//! Auth adapter: a single-identity state machine over the store's
//! authentication facade.

use crate::cell::{Cell, Snapshot, WatchId};
use crate::error::{CacheError, CacheResult};
use docmirror_store::{AuthListenerId, AuthStore, Record};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A reactive view of the store's authenticated identity.
///
/// The identity cell is `Unset` until first attach, `Empty` while anonymous,
/// and holds the identity record while logged in. The identity-change
/// listener is registered on first attach and removed on last detach, so the
/// cell tracks the store only while observed.
pub struct AuthView {
    store: Arc<dyn AuthStore>,
    identity: Cell<Snapshot<Record>>,
    loading: Cell<bool>,
    error: Cell<Option<CacheError>>,
    observers: AtomicUsize,
    listener: Mutex<Option<AuthListenerId>>,
}

impl AuthView {
    /// Creates an auth view over the given store.
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            identity: Cell::new(Snapshot::Unset),
            loading: Cell::new(false),
            error: Cell::new(None),
            observers: AtomicUsize::new(0),
            listener: Mutex::new(None),
        }
    }

    /// Registers an observer. On the first one, seeds the identity cell from
    /// the store and starts listening for identity changes.
    pub fn attach(&self) {
        if self.observers.fetch_add(1, Ordering::SeqCst) != 0 {
            return;
        }

        self.identity.set(Snapshot::from(self.store.identity()));

        let identity = self.identity.clone();
        let id = self.store.on_change(Arc::new(move |record| {
            identity.set(Snapshot::from(record));
        }));
        *self.listener.lock() = Some(id);
        debug!("auth listener registered");
    }

    /// Unregisters an observer. After the last one, removes the
    /// identity-change listener. The identity cell keeps its last value.
    pub fn detach(&self) {
        let last = self
            .observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|prev| prev == 1)
            .unwrap_or(false);
        if last {
            if let Some(id) = self.listener.lock().take() {
                self.store.remove_listener(id);
                debug!("auth listener removed");
            }
        }
    }

    /// Re-seeds the identity cell from the store's current identity.
    pub fn refetch(&self) {
        self.identity.set(Snapshot::from(self.store.identity()));
    }

    /// The current identity snapshot.
    pub fn identity(&self) -> Snapshot<Record> {
        self.identity.get()
    }

    /// The identity cell, for host reactivity integrations.
    pub fn identity_cell(&self) -> &Cell<Snapshot<Record>> {
        &self.identity
    }

    /// True if an identity is present and its session token is valid.
    pub fn is_logged_in(&self) -> bool {
        matches!(self.identity.get(), Snapshot::Value(_)) && self.store.is_valid()
    }

    /// True while a login or logout call is in flight.
    pub fn loading(&self) -> bool {
        self.loading.get()
    }

    /// The last-observed authentication failure, if any.
    pub fn error(&self) -> Option<CacheError> {
        self.error.get()
    }

    /// Watches the identity cell for changes.
    pub fn watch(&self, callback: impl Fn(&Snapshot<Record>) + Send + Sync + 'static) -> WatchId {
        self.identity.watch(callback)
    }

    /// Removes an identity watcher.
    pub fn unwatch(&self, id: WatchId) {
        self.identity.unwatch(id);
    }

    /// Attempts password authentication.
    ///
    /// The loading flag is cleared on success and failure alike; failures are
    /// captured into the error state and returned. The identity cell is
    /// updated by the change listener, not by this call.
    pub async fn login(&self, identity: &str, secret: &str) -> CacheResult<Record> {
        self.error.set(None);
        self.loading.set(true);
        let result = self.store.authenticate(identity, secret).await;
        self.loading.set(false);

        match result {
            Ok(record) => Ok(record),
            Err(err) => {
                let err = CacheError::from(err);
                self.error.set(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Clears the store's session.
    ///
    /// Does not itself push the anonymous state into the identity cell; the
    /// change listener observes the cleared session and updates the cell.
    pub fn logout(&self) {
        self.loading.set(true);
        self.store.clear_session();
        self.loading.set(false);
    }
}
