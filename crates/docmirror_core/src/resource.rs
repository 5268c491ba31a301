//! The synchronization core: a generic state machine over fetch/subscribe
//! strategies.
//!
//! A [`Resource`] owns one snapshot cell, a loading flag, an error slot, and
//! at most one live subscription. It decides when to fetch versus subscribe
//! based on a `listen` flag fixed at construction; the entity adapters supply
//! the actual fetch and subscribe behavior through [`ResourceStrategy`].
//!
//! Within one resource the snapshot/loading/error triple is not protected by
//! any lock. Racing operations are resolved last-write-wins, with one guard:
//! every fetch runs under a generation number, and a fetch whose generation is
//! no longer current (a newer fetch started, or `stop()` was called) discards
//! its result instead of landing it on the snapshot.

use crate::cell::{Cell, Snapshot};
use crate::error::CacheError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

type TeardownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to an active live channel. Owns the teardown closure.
pub struct Subscription {
    teardown: Box<dyn FnOnce() -> TeardownFuture + Send>,
}

impl Subscription {
    /// Creates a subscription from an async teardown closure.
    pub fn new<F, Fut>(teardown: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            teardown: Box::new(move || Box::pin(teardown())),
        }
    }

    /// Tears down the live channel.
    pub async fn cancel(self) {
        (self.teardown)().await;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Shared observable state owned by one resource instance.
pub struct ResourceState<T> {
    snapshot: Cell<Snapshot<T>>,
    loading: Cell<bool>,
    error: Cell<Option<CacheError>>,
    subscription: parking_lot::Mutex<Option<Subscription>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

impl<T: Clone> ResourceState<T> {
    /// Creates state with an unset snapshot, idle loading flag, and no error.
    pub fn new() -> Self {
        Self {
            snapshot: Cell::new(Snapshot::Unset),
            loading: Cell::new(false),
            error: Cell::new(None),
            subscription: parking_lot::Mutex::new(None),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// The snapshot cell.
    pub fn snapshot(&self) -> &Cell<Snapshot<T>> {
        &self.snapshot
    }

    /// The loading-flag cell. True exactly while a remote call is in flight.
    pub fn loading(&self) -> &Cell<bool> {
        &self.loading
    }

    /// The error cell. Holds the last-observed failure, cleared at the start
    /// of every new attempt.
    pub fn error(&self) -> &Cell<Option<CacheError>> {
        &self.error
    }

    /// Marks the start of a remote call: clears the error and raises the
    /// loading flag.
    pub fn begin_operation(&self) {
        self.error.set(None);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.loading.set(true);
    }

    /// Marks the end of a remote call, lowering the loading flag once no
    /// calls remain in flight.
    pub fn end_operation(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.loading.set(false);
        }
    }

    /// Marks the start of a fetch, returning its generation number.
    pub fn begin_fetch(&self) -> u64 {
        self.begin_operation();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns true if a fetch with this generation may still land its result.
    pub fn fetch_is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidates all in-flight fetches, so late-arriving responses are
    /// discarded.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a failure into the error cell.
    pub fn record_error(&self, error: CacheError) {
        self.error.set(Some(error));
    }

    /// Stores the subscription handle. Returns the displaced handle if one
    /// was already active (the caller is expected to cancel it).
    pub fn set_subscription(&self, subscription: Subscription) -> Option<Subscription> {
        self.subscription.lock().replace(subscription)
    }

    /// Takes the subscription handle, leaving the slot empty.
    pub fn take_subscription(&self) -> Option<Subscription> {
        self.subscription.lock().take()
    }

    /// Returns true if a live subscription is active.
    pub fn has_subscription(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

impl<T: Clone> Default for ResourceState<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The fetch/subscribe extension points supplied by each entity adapter.
///
/// Strategies are injected into the generic [`Resource`] rather than
/// specialized through inheritance: the resource handles lifecycle, the
/// strategy handles the remote protocol. Failure semantics live inside
/// `fetch` — a document strategy keeps the prior snapshot on failure, a
/// collection strategy resets it to an empty list.
#[async_trait]
pub trait ResourceStrategy: Send + Sync {
    /// The snapshot value type: a single record or an ordered record list.
    type Output: Clone + Send + Sync + 'static;

    /// One-time initialization awaited before the first fetch or
    /// subscription. Typically the store's readiness future.
    async fn init(&self) -> Result<(), CacheError> {
        Ok(())
    }

    /// Performs exactly one fetch, landing results and failures on `state`.
    async fn fetch(&self, state: &ResourceState<Self::Output>);

    /// Performs an initial fetch, then opens a live channel.
    ///
    /// Returns `None` if no channel could be established; failures are
    /// recorded on `state` but do not roll back the initial fetch.
    async fn subscribe(&self, state: &ResourceState<Self::Output>) -> Option<Subscription>;
}

/// A reactive resource: one snapshot kept in sync with the remote store by
/// pull (fetch) when idle and push (subscription) when `listen` is enabled.
pub struct Resource<S: ResourceStrategy> {
    strategy: S,
    state: Arc<ResourceState<S::Output>>,
    listen: bool,
    ready: OnceCell<()>,
    observers: AtomicUsize,
}

impl<S: ResourceStrategy> Resource<S> {
    /// Creates a resource with the given strategy and listen mode.
    pub fn new(strategy: S, listen: bool) -> Self {
        Self {
            strategy,
            state: Arc::new(ResourceState::new()),
            listen,
            ready: OnceCell::new(),
            observers: AtomicUsize::new(0),
        }
    }

    /// The observable state owned by this resource.
    pub fn state(&self) -> &Arc<ResourceState<S::Output>> {
        &self.state
    }

    /// Returns true if this resource prefers subscription over one-shot
    /// fetches.
    pub fn listen(&self) -> bool {
        self.listen
    }

    /// Registers an observer, starting the resource on the first one.
    pub async fn attach(&self) {
        if self.observers.fetch_add(1, Ordering::SeqCst) == 0 {
            self.start().await;
        }
    }

    /// Unregisters an observer, stopping the resource after the last one.
    pub async fn detach(&self) {
        let last = self
            .observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|prev| prev == 1)
            .unwrap_or(false);
        if last {
            self.stop().await;
        }
    }

    /// Starts the resource: awaits one-time initialization, then subscribes
    /// (listen mode) or fetches once.
    ///
    /// Idempotent: calling `start` while a subscription is already active is
    /// a no-op.
    pub async fn start(&self) {
        self.ready
            .get_or_init(|| async {
                if let Err(err) = self.strategy.init().await {
                    warn!(error = %err, "resource initialization failed");
                    self.state.record_error(err);
                }
            })
            .await;

        if self.listen {
            if self.state.has_subscription() {
                debug!("start: subscription already active");
                return;
            }
            if let Some(subscription) = self.strategy.subscribe(&self.state).await {
                if let Some(displaced) = self.state.set_subscription(subscription) {
                    // Two concurrent starts raced; keep the newer channel.
                    displaced.cancel().await;
                }
            }
        } else {
            self.strategy.fetch(&self.state).await;
        }
    }

    /// Stops the resource: tears down the live subscription if one is active
    /// and discards any in-flight fetch results. Never clears the snapshot.
    pub async fn stop(&self) {
        self.state.invalidate();
        if let Some(subscription) = self.state.take_subscription() {
            debug!("stop: tearing down subscription");
            subscription.cancel().await;
        }
    }

    /// Performs exactly one fetch, regardless of listen mode, leaving any
    /// active subscription untouched.
    pub async fn refetch(&self) {
        self.strategy.fetch(&self.state).await;
    }
}
