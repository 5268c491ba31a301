//! Single-document adapter: one record resolved by identifier or filter.

use crate::cell::{Cell, Snapshot, WatchId};
use crate::error::{CacheError, CacheResult};
use crate::resource::{Resource, ResourceState, ResourceStrategy, Subscription};
use async_trait::async_trait;
use docmirror_store::{
    EventAction, EventCallback, FieldMap, QueryOptions, Record, RecordId, RecordStore,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Configuration for a [`DocumentView`].
///
/// At least one of `id`/`filter` should be supplied; with neither, fetches
/// log a warning and resolve to an empty snapshot.
#[derive(Debug, Clone, Default)]
pub struct DocumentConfig {
    /// Collection name (required).
    pub collection: String,
    /// Record identifier to resolve by.
    pub id: Option<RecordId>,
    /// Filter expression to resolve by (first match only).
    pub filter: Option<String>,
    /// Relation-expansion expression.
    pub expand: Option<String>,
    /// Field-selection expression.
    pub fields: Option<String>,
    /// Prefer a live subscription over one-shot fetches.
    pub listen: bool,
    /// Persist local field edits automatically in the background.
    pub autosave: bool,
}

impl DocumentConfig {
    /// Creates a configuration for the given collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Resolves the document by identifier.
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Resolves the document by filter expression (first match).
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
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

    /// Enables or disables listen mode.
    pub fn with_listen(mut self, listen: bool) -> Self {
        self.listen = listen;
        self
    }

    /// Enables or disables autosave.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }
}

/// State shared between the document strategy and its view.
struct DocumentShared {
    store: Arc<dyn RecordStore>,
    config: DocumentConfig,
    /// Identifier learned from the last successful fetch. Used to key the
    /// live channel when the document was resolved by filter.
    resolved_id: Mutex<Option<RecordId>>,
}

impl DocumentShared {
    fn options(&self) -> QueryOptions {
        QueryOptions {
            filter: None,
            sort: None,
            expand: self.config.expand.clone(),
            fields: self.config.fields.clone(),
        }
    }

    /// Resolves the record from the store: by id when configured, otherwise
    /// a single-item filtered query. `Ok(None)` means resolved-but-absent.
    async fn resolve(&self) -> Result<Option<Record>, CacheError> {
        if let Some(id) = &self.config.id {
            let record = self
                .store
                .get_one(&self.config.collection, id, &self.options())
                .await?;
            return Ok(Some(record));
        }
        if let Some(filter) = &self.config.filter {
            let options = self.options().with_filter(filter.clone());
            let page = self
                .store
                .get_list(&self.config.collection, 1, 1, &options)
                .await?;
            return Ok(page.items.into_iter().next());
        }
        warn!(
            collection = %self.config.collection,
            "document view configured with neither id nor filter"
        );
        Ok(None)
    }

    /// Persists the current snapshot's writable fields.
    ///
    /// With a live subscription active the snapshot is left for the
    /// subscription to reconcile; otherwise the server's response becomes the
    /// new snapshot. Returns `Ok(None)` when there is no snapshot to save.
    async fn save_current(&self, state: &ResourceState<Record>) -> CacheResult<Option<Record>> {
        let record = match state.snapshot().get() {
            Snapshot::Value(record) => record,
            _ => return Ok(None),
        };

        state.begin_operation();
        let result = self
            .store
            .update(&self.config.collection, &record.id, &record.fields)
            .await;
        state.end_operation();

        match result {
            Ok(saved) => {
                if !state.has_subscription() {
                    state.snapshot().set(Snapshot::Value(saved.clone()));
                }
                Ok(Some(saved))
            }
            Err(err) => {
                let err = CacheError::from(err);
                state.record_error(err.clone());
                Err(err)
            }
        }
    }
}

struct DocumentStrategy {
    shared: Arc<DocumentShared>,
}

#[async_trait]
impl ResourceStrategy for DocumentStrategy {
    type Output = Record;

    async fn init(&self) -> Result<(), CacheError> {
        self.shared.store.ready().await?;
        Ok(())
    }

    async fn fetch(&self, state: &ResourceState<Record>) {
        let generation = state.begin_fetch();
        let outcome = self.shared.resolve().await;
        if state.fetch_is_current(generation) {
            match outcome {
                Ok(Some(record)) => {
                    *self.shared.resolved_id.lock() = Some(record.id.clone());
                    state.snapshot().set(Snapshot::Value(record));
                }
                Ok(None) => state.snapshot().set(Snapshot::Empty),
                Err(err) => {
                    // A single resource has no safe empty substitute: keep
                    // the previous snapshot and surface the error.
                    warn!(
                        collection = %self.shared.config.collection,
                        error = %err,
                        "document fetch failed"
                    );
                    state.record_error(err);
                }
            }
        }
        state.end_operation();
    }

    async fn subscribe(&self, state: &ResourceState<Record>) -> Option<Subscription> {
        self.fetch(state).await;

        let id = {
            let resolved = self.shared.resolved_id.lock().clone();
            resolved.or_else(|| self.shared.config.id.clone())
        };
        let Some(id) = id else {
            // No resolvable identifier: the consumer simply never receives
            // live updates.
            debug!(
                collection = %self.shared.config.collection,
                "no resolvable id, skipping subscription"
            );
            return None;
        };

        let snapshot = state.snapshot().clone();
        let callback: EventCallback = Arc::new(move |event| match event.action {
            EventAction::Create | EventAction::Update => {
                snapshot.set(Snapshot::Value(event.record));
            }
            EventAction::Delete => snapshot.set(Snapshot::Empty),
        });

        let collection = self.shared.config.collection.clone();
        match self
            .shared
            .store
            .subscribe(&collection, id.as_str(), callback)
            .await
        {
            Ok(()) => {
                let store = Arc::clone(&self.shared.store);
                let topic = id.clone();
                Some(Subscription::new(move || async move {
                    if let Err(err) = store.unsubscribe(&collection, topic.as_str()).await {
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

/// A reactive view of a single remote document.
///
/// Resolves by identifier or filter, exposes the snapshot/loading/error
/// triple, and supports explicit saves, per-field patches, and background
/// autosave.
pub struct DocumentView {
    resource: Resource<DocumentStrategy>,
    shared: Arc<DocumentShared>,
}

impl DocumentView {
    /// Creates a document view over the given store.
    pub fn new(store: Arc<dyn RecordStore>, config: DocumentConfig) -> Self {
        let listen = config.listen;
        let shared = Arc::new(DocumentShared {
            store,
            config,
            resolved_id: Mutex::new(None),
        });
        let strategy = DocumentStrategy {
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

    /// Performs exactly one fetch, regardless of listen mode.
    pub async fn refetch(&self) {
        self.resource.refetch().await;
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot<Record> {
        self.resource.state().snapshot().get()
    }

    /// The current record, if the snapshot is resolved to one.
    pub fn record(&self) -> Option<Record> {
        self.snapshot().into_value()
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
    pub fn watch(&self, callback: impl Fn(&Snapshot<Record>) + Send + Sync + 'static) -> WatchId {
        self.resource.state().snapshot().watch(callback)
    }

    /// Removes a snapshot watcher.
    pub fn unwatch(&self, id: WatchId) {
        self.resource.state().snapshot().unwatch(id);
    }

    /// The snapshot cell, for host reactivity integrations.
    pub fn snapshot_cell(&self) -> &Cell<Snapshot<Record>> {
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

    /// Persists the current snapshot's writable fields and returns the
    /// server-confirmed record. No-op returning `None` when the snapshot is
    /// absent.
    ///
    /// Reserved fields (identifier, timestamps, collection origin) are never
    /// part of the payload: only [`Record::fields`] is sent.
    pub async fn save(&self) -> CacheResult<Option<Record>> {
        self.shared.save_current(self.resource.state()).await
    }

    /// Replaces the snapshot with a locally constructed record.
    ///
    /// With autosave enabled this schedules a background save; failures of
    /// that save land in the error state only.
    pub fn set(&self, record: Record) {
        self.resource
            .state()
            .snapshot()
            .set(Snapshot::Value(record));
        if self.shared.config.autosave {
            self.schedule_autosave();
        }
    }

    /// Applies a single-field patch to the local snapshot.
    ///
    /// With autosave disabled the change is persisted immediately via
    /// [`DocumentView::save`]; with autosave enabled persistence happens in
    /// the background and the updated local record is returned.
    ///
    /// Returns [`CacheError::NoSnapshot`] if no record is materialized.
    pub async fn set_field(&self, name: &str, value: Value) -> CacheResult<Option<Record>> {
        let mut fields = FieldMap::new();
        fields.insert(name.to_string(), value);
        self.patch(fields).await
    }

    /// Applies a multi-field patch to the local snapshot, with the same
    /// persistence semantics as [`DocumentView::set_field`].
    pub async fn patch(&self, fields: FieldMap) -> CacheResult<Option<Record>> {
        let mut patched = false;
        self.resource.state().snapshot().update(|snapshot| {
            if let Snapshot::Value(record) = snapshot {
                record.merge(&fields);
                patched = true;
            }
        });
        if !patched {
            return Err(CacheError::NoSnapshot);
        }

        if self.shared.config.autosave {
            self.schedule_autosave();
            Ok(self.record())
        } else {
            self.save().await
        }
    }

    /// Spawns a background save of the current snapshot. Never surfaces
    /// failures to the caller that performed the assignment.
    fn schedule_autosave(&self) {
        let shared = Arc::clone(&self.shared);
        let state = Arc::clone(self.resource.state());
        tokio::spawn(async move {
            if let Err(err) = shared.save_current(&state).await {
                error!(
                    collection = %shared.config.collection,
                    error = %err,
                    "autosave failed"
                );
            }
        });
    }
}
