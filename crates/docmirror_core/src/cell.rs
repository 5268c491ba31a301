//! The reactive cell: a watched value with reference-counted attachment.
//!
//! `Cell<T>` is the one reactivity primitive the core depends on. It holds a
//! value, notifies registered watchers synchronously on every write, and
//! counts attached observers so the owning resource can open its data source
//! on the first attach and close it on the last detach. It is deliberately
//! independent of any UI framework.
//!
//! The cell never holds its lock across a watcher callback: watchers and the
//! new value are cloned out first, then invoked with the lock released.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identifies a registered watcher so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct CellInner<T> {
    value: T,
    watchers: Vec<(WatchId, Watcher<T>)>,
    next_id: u64,
}

/// A mutable, observed container.
///
/// Cloning a `Cell` yields another handle to the same value and watcher
/// registry.
pub struct Cell<T> {
    inner: Arc<RwLock<CellInner<T>>>,
    observers: Arc<AtomicUsize>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T: Clone> Cell<T> {
    /// Creates a cell holding the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CellInner {
                value,
                watchers: Vec::new(),
                next_id: 0,
            })),
            observers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.read().value.clone()
    }

    /// Replaces the value and notifies all watchers.
    pub fn set(&self, value: T) {
        let (value, watchers) = {
            let mut inner = self.inner.write();
            inner.value = value;
            (inner.value.clone(), inner.watchers.clone())
        };
        for (_, watcher) in watchers {
            watcher(&value);
        }
    }

    /// Mutates the value in place and notifies all watchers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let (value, watchers) = {
            let mut inner = self.inner.write();
            f(&mut inner.value);
            (inner.value.clone(), inner.watchers.clone())
        };
        for (_, watcher) in watchers {
            watcher(&value);
        }
    }

    /// Registers a watcher invoked after every write.
    pub fn watch(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> WatchId {
        let mut inner = self.inner.write();
        let id = WatchId(inner.next_id);
        inner.next_id += 1;
        inner.watchers.push((id, Arc::new(callback)));
        id
    }

    /// Removes a previously registered watcher.
    pub fn unwatch(&self, id: WatchId) {
        self.inner.write().watchers.retain(|(wid, _)| *wid != id);
    }

    /// Increments the observer count. Returns true on the 0 → 1 transition.
    pub fn attach(&self) -> bool {
        self.observers.fetch_add(1, Ordering::SeqCst) == 0
    }

    /// Decrements the observer count. Returns true on the 1 → 0 transition.
    ///
    /// Detaching with no observers attached is a no-op.
    pub fn detach(&self) -> bool {
        self.observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|prev| prev == 1)
            .unwrap_or(false)
    }

    /// Returns the number of attached observers.
    pub fn observers(&self) -> usize {
        self.observers.load(Ordering::SeqCst)
    }
}

/// The locally observed value of a document or collection.
///
/// Transitions once from [`Snapshot::Unset`] to either [`Snapshot::Empty`] or
/// [`Snapshot::Value`] on the first successful resolution, and stays resolved
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot<T> {
    /// Not yet initialized; no fetch has resolved.
    Unset,
    /// Resolved to empty/absent.
    Empty,
    /// Resolved to a concrete value.
    Value(T),
}

impl<T> Snapshot<T> {
    /// Returns true if no fetch has resolved yet.
    pub fn is_unset(&self) -> bool {
        matches!(self, Snapshot::Unset)
    }

    /// Returns true if resolved to empty/absent.
    pub fn is_empty(&self) -> bool {
        matches!(self, Snapshot::Empty)
    }

    /// Returns the concrete value, if resolved to one.
    pub fn value(&self) -> Option<&T> {
        match self {
            Snapshot::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the snapshot, returning the concrete value if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Snapshot::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot::Unset
    }
}

impl<T> From<Option<T>> for Snapshot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Snapshot::Value(value),
            None => Snapshot::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn set_notifies_watchers() {
        let cell = Cell::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        cell.watch(move |v| seen_clone.lock().push(*v));

        cell.set(1);
        cell.set(2);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn unwatch_stops_notifications() {
        let cell = Cell::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let id = cell.watch(move |v| seen_clone.lock().push(*v));

        cell.set(1);
        cell.unwatch(id);
        cell.set(2);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn update_mutates_in_place() {
        let cell = Cell::new(vec![1u32]);
        cell.update(|v| v.push(2));
        assert_eq!(cell.get(), vec![1, 2]);
    }

    #[test]
    fn attach_detach_refcounting() {
        let cell = Cell::new(());
        assert!(cell.attach());
        assert!(!cell.attach());
        assert_eq!(cell.observers(), 2);

        assert!(!cell.detach());
        assert!(cell.detach());
        assert_eq!(cell.observers(), 0);

        // Detach without observers is a no-op, not an underflow.
        assert!(!cell.detach());
        assert_eq!(cell.observers(), 0);
    }

    #[test]
    fn clones_share_state() {
        let cell = Cell::new(1u32);
        let other = cell.clone();
        other.set(7);
        assert_eq!(cell.get(), 7);
    }

    #[test]
    fn snapshot_transitions() {
        let snap: Snapshot<u32> = Snapshot::default();
        assert!(snap.is_unset());

        let snap = Snapshot::from(None::<u32>);
        assert!(snap.is_empty());

        let snap = Snapshot::from(Some(5u32));
        assert_eq!(snap.value(), Some(&5));
        assert_eq!(snap.into_value(), Some(5));
    }
}
