//! Collection adapter: a paginated, reactive list of remote records.

use crate::cell::{Cell, Snapshot, WatchId};
use crate::error::{CacheError, CacheResult};
use crate::resource::{Resource, ResourceState, ResourceStrategy, Subscription};
use async_trait::async_trait;
use docmirror_store::{
    EventAction, EventCallback, FieldMap, QueryOptions, Record, RecordEvent, RecordId, RecordStore,
    WILDCARD_TOPIC,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Default page size for list fetches.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Configuration for a [`CollectionView`].
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Collection name (required).
    pub collection: String,
    /// Filter expression, evaluated server-side.
    pub filter: Option<String>,
    /// Sort expression, evaluated server-side.
    pub sort: Option<String>,
    /// Relation-expansion expression.
    pub expand: Option<String>,
    /// Field-selection expression.
    pub fields: Option<String>,
    /// Page size for list fetches.
    pub per_page: u32,
    /// Prefer a live subscription over one-shot fetches.
    pub listen: bool,
}

impl CollectionConfig {
    /// Creates a configuration for the given collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            sort: None,
            expand: None,
            fields: None,
            per_page: DEFAULT_PER_PAGE,
            listen: false,
        }
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the sort expression.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the relation-expansion expression.
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Sets the field-selection expression.
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Sets the page size.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Enables or disables listen mode.
    pub fn with_listen(mut self, listen: bool) -> Self {
        self.listen = listen;
        self
    }
}

/// Pagination state for the materialized window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    /// Current page (1-based).
    pub page: u32,
    /// Total number of pages, recomputed from each fetch response.
    pub total_pages: u32,
    /// Total number of matching records across all pages.
    pub total_items: u64,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            page: 1,
            total_pages: 1,
            total_items: 0,
        }
    }
}

/// Merges one live event into a materialized page of records.
///
/// Creates append to the end, updates replace the matching identifier in
/// place, deletes remove it; unmatched updates and deletes are ignored. The
/// patch never re-sorts or re-pages: it is an unordered patch over whatever
/// window is currently materialized. Updates and deletes are idempotent under
/// duplicate delivery; creates are not (a retried create event appends
/// twice), which is a known gap of the live protocol.
pub fn reconcile(items: &mut Vec<Record>, event: RecordEvent) {
    match event.action {
        EventAction::Create => items.push(event.record),
        EventAction::Update => {
            if let Some(slot) = items.iter_mut().find(|item| item.id == event.record.id) {
                *slot = event.record;
            }
        }
        EventAction::Delete => items.retain(|item| item.id != event.record.id),
    }
}

/// State shared between the collection strategy and its view.
struct CollectionShared {
    store: Arc<dyn RecordStore>,
    config: CollectionConfig,
    pages: Mutex<PageState>,
}

impl CollectionShared {
    fn options(&self) -> QueryOptions {
        QueryOptions {
            filter: self.config.filter.clone(),
            sort: self.config.sort.clone(),
            expand: self.config.expand.clone(),
            fields: self.config.fields.clone(),
        }
    }
}

struct CollectionStrategy {
    shared: Arc<CollectionShared>,
}

#[async_trait]
impl ResourceStrategy for CollectionStrategy {
    type Output = Vec<Record>;

    async fn init(&self) -> Result<(), CacheError> {
        self.shared.store.ready().await?;
        Ok(())
    }

    async fn fetch(&self, state: &ResourceState<Vec<Record>>) {
        let generation = state.begin_fetch();
        let page = self.shared.pages.lock().page;
        let result = self
            .shared
            .store
            .get_list(
                &self.shared.config.collection,
                page,
                self.shared.config.per_page,
                &self.shared.options(),
            )
            .await;

        if state.fetch_is_current(generation) {
            match result {
                Ok(response) => {
                    {
                        let mut pages = self.shared.pages.lock();
                        pages.total_pages = response.total_pages.max(1);
                        pages.total_items = response.total_items;
                    }
                    state.snapshot().set(Snapshot::Value(response.items));
                }
                Err(err) => {
                    // An empty list is a valid representation of "no
                    // results"; pagination totals keep their prior values.
                    warn!(
                        collection = %self.shared.config.collection,
                        error = %err,
                        "collection fetch failed"
                    );
                    state.snapshot().set(Snapshot::Value(Vec::new()));
                    state.record_error(err.into());
                }
            }
        }
        state.end_operation();
    }

    /// Initial fetch, then one live channel over the whole collection.
    ///
    /// The wildcard channel does not honor the configured server-side filter
    /// the way the list query does; events for records outside the filter
    /// may arrive and are patched in as-is.
    async fn subscribe(&self, state: &ResourceState<Vec<Record>>) -> Option<Subscription> {
        self.fetch(state).await;

        let snapshot = state.snapshot().clone();
        let callback: EventCallback = Arc::new(move |event| {
            snapshot.update(|current| {
                if let Snapshot::Value(items) = current {
                    reconcile(items, event);
                }
            });
        });

        let collection = self.shared.config.collection.clone();
        match self
            .shared
            .store
            .subscribe(&collection, WILDCARD_TOPIC, callback)
            .await
        {
            Ok(()) => {
                let store = Arc::clone(&self.shared.store);
                Some(Subscription::new(move || async move {
                    if let Err(err) = store.unsubscribe(&collection, WILDCARD_TOPIC).await {
                        warn!(error = %err, "unsubscribe failed");
                    }
                }))
            }
            Err(err) => {
                state.record_error(err.into());
                None
            }
        }
    }
}

/// A reactive, paginated view of a remote collection.
///
/// CRUD mutations are optimistic when no subscription is active (the server
/// response is patched into the local snapshot without a refetch) and
/// listen-driven otherwise (the live channel's event performs the patch,
/// avoiding a double-write).
pub struct CollectionView {
    resource: Resource<CollectionStrategy>,
    shared: Arc<CollectionShared>,
}

impl CollectionView {
    /// Creates a collection view over the given store.
    pub fn new(store: Arc<dyn RecordStore>, config: CollectionConfig) -> Self {
        let listen = config.listen;
        let shared = Arc::new(CollectionShared {
            store,
            config,
            pages: Mutex::new(PageState::default()),
        });
        let strategy = CollectionStrategy {
            shared: Arc::clone(&shared),
        };
        Self {
            resource: Resource::new(strategy, listen),
            shared,
        }
    }

    /// Registers an observer, starting the view on the first one.
    pub async fn attach(&self) {
        self.resource.attach().await;
    }

    /// Unregisters an observer, stopping the view after the last one.
    pub async fn detach(&self) {
        self.resource.detach().await;
    }

    /// Starts the view (fetch once, or subscribe in listen mode).
    pub async fn start(&self) {
        self.resource.start().await;
    }

    /// Stops the view, tearing down the live subscription if active.
    pub async fn stop(&self) {
        self.resource.stop().await;
    }

    /// Performs exactly one fetch of the current page.
    pub async fn refetch(&self) {
        self.resource.refetch().await;
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot<Vec<Record>> {
        self.resource.state().snapshot().get()
    }

    /// The materialized records, empty if the snapshot is not yet resolved.
    pub fn items(&self) -> Vec<Record> {
        self.snapshot().into_value().unwrap_or_default()
    }

    /// True while a fetch or mutating remote call is in flight.
    pub fn loading(&self) -> bool {
        self.resource.state().loading().get()
    }

    /// The last-observed failure, if the most recent operation failed.
    pub fn error(&self) -> Option<CacheError> {
        self.resource.state().error().get()
    }

    /// Watches the snapshot for changes.
    pub fn watch(
        &self,
        callback: impl Fn(&Snapshot<Vec<Record>>) + Send + Sync + 'static,
    ) -> WatchId {
        self.resource.state().snapshot().watch(callback)
    }

    /// Removes a snapshot watcher.
    pub fn unwatch(&self, id: WatchId) {
        self.resource.state().snapshot().unwatch(id);
    }

    /// The snapshot cell, for host reactivity integrations.
    pub fn snapshot_cell(&self) -> &Cell<Snapshot<Vec<Record>>> {
        self.resource.state().snapshot()
    }

    /// The loading-flag cell, for host reactivity integrations.
    pub fn loading_cell(&self) -> &Cell<bool> {
        self.resource.state().loading()
    }

    /// The error cell, for host reactivity integrations.
    pub fn error_cell(&self) -> &Cell<Option<CacheError>> {
        self.resource.state().error()
    }

    /// The current page number (1-based).
    pub fn page(&self) -> u32 {
        self.shared.pages.lock().page
    }

    /// The total number of pages, as of the last successful fetch.
    pub fn total_pages(&self) -> u32 {
        self.shared.pages.lock().total_pages
    }

    /// The total number of matching records, as of the last successful fetch.
    pub fn total_items(&self) -> u64 {
        self.shared.pages.lock().total_items
    }

    /// Creates a record.
    ///
    /// When subscribed, the live channel's create event patches the snapshot
    /// (no local append, avoiding duplication). When not subscribed, the
    /// server-confirmed record is appended locally without a refetch.
    pub async fn add(&self, fields: FieldMap) -> CacheResult<Record> {
        let state = self.resource.state();
        state.begin_operation();
        let result = self
            .shared
            .store
            .create(&self.shared.config.collection, &fields)
            .await;
        state.end_operation();

        match result {
            Ok(record) => {
                if !state.has_subscription() {
                    state.snapshot().update(|snapshot| match snapshot {
                        Snapshot::Value(items) => items.push(record.clone()),
                        other => *other = Snapshot::Value(vec![record.clone()]),
                    });
                }
                Ok(record)
            }
            Err(err) => {
                let err = CacheError::from(err);
                state.record_error(err.clone());
                Err(err)
            }
        }
    }

    /// Updates a record by identifier with a partial field mapping.
    ///
    /// When subscribed, the live channel reconciles; otherwise the server
    /// response replaces the matching local item.
    pub async fn update(&self, id: &RecordId, fields: FieldMap) -> CacheResult<Record> {
        let state = self.resource.state();
        state.begin_operation();
        let result = self
            .shared
            .store
            .update(&self.shared.config.collection, id, &fields)
            .await;
        state.end_operation();

        match result {
            Ok(record) => {
                if !state.has_subscription() {
                    state.snapshot().update(|snapshot| {
                        if let Snapshot::Value(items) = snapshot {
                            if let Some(slot) = items.iter_mut().find(|item| item.id == record.id)
                            {
                                *slot = record.clone();
                            }
                        }
                    });
                }
                Ok(record)
            }
            Err(err) => {
                let err = CacheError::from(err);
                state.record_error(err.clone());
                Err(err)
            }
        }
    }

    /// Deletes a record by identifier.
    ///
    /// When subscribed, the live channel reconciles; otherwise the matching
    /// local item is filtered out.
    pub async fn remove(&self, id: &RecordId) -> CacheResult<()> {
        let state = self.resource.state();
        state.begin_operation();
        let result = self
            .shared
            .store
            .delete(&self.shared.config.collection, id)
            .await;
        state.end_operation();

        match result {
            Ok(()) => {
                if !state.has_subscription() {
                    state.snapshot().update(|snapshot| {
                        if let Snapshot::Value(items) = snapshot {
                            items.retain(|item| &item.id != id);
                        }
                    });
                }
                Ok(())
            }
            Err(err) => {
                let err = CacheError::from(err);
                state.record_error(err.clone());
                Err(err)
            }
        }
    }

    /// Pure local lookup over the current snapshot.
    pub fn get_by_id(&self, id: &RecordId) -> Option<Record> {
        match self.snapshot() {
            Snapshot::Value(items) => items.into_iter().find(|item| &item.id == id),
            _ => None,
        }
    }

    /// Moves to the next page, if one exists.
    pub async fn next_page(&self) {
        let target = self.page().saturating_add(1);
        self.go_to_page(target).await;
    }

    /// Moves to the previous page, if one exists.
    pub async fn prev_page(&self) {
        let page = self.page();
        if page > 1 {
            self.go_to_page(page - 1).await;
        }
    }

    /// Moves to the given page and fetches it.
    ///
    /// Pages outside `[1, total_pages]` are silently ignored: page counter,
    /// snapshot, and totals are left unchanged and no fetch is performed.
    pub async fn go_to_page(&self, page: u32) {
        let accepted = {
            let mut pages = self.shared.pages.lock();
            if page >= 1 && page <= pages.total_pages {
                pages.page = page;
                true
            } else {
                false
            }
        };
        if accepted {
            self.refetch().await;
        }
    }
}
