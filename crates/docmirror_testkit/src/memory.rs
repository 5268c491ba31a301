//! An in-memory document store for driving adapters in tests.

use async_trait::async_trait;
use docmirror_store::{
    AuthCallback, AuthListenerId, AuthStore, EventCallback, FieldMap, QueryOptions, Record,
    RecordEvent, RecordId, RecordPage, RecordStore, StoreError, StoreResult,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Counters for every store entry point, for asserting call behavior.
#[derive(Debug, Default)]
struct CallCounters {
    get_one: AtomicUsize,
    get_list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    subscribe: AtomicUsize,
    unsubscribe: AtomicUsize,
}

struct AuthState {
    identity: Option<Record>,
    valid: bool,
    accounts: HashMap<String, (String, Record)>,
    listeners: HashMap<u64, AuthCallback>,
    next_listener: u64,
}

struct Inner {
    /// Records per collection, in insertion order.
    collections: HashMap<String, Vec<Record>>,
    /// Live-channel callbacks keyed by (collection, topic).
    subscribers: HashMap<(String, String), EventCallback>,
    auth: AuthState,
}

/// An in-memory [`RecordStore`] and [`AuthStore`].
///
/// Records live in per-collection tables with server-assigned identifiers
/// (`rec1`, `rec2`, ...) and monotonic timestamps (`t1`, `t2`, ...). Every
/// committed create/update/delete is fanned out to matching subscribers, the
/// way a real backend pushes realtime events. Filters are evaluated with a
/// deliberately tiny `field='value'` equality check, enough for tests;
/// anything else matches all records.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    counters: CallCounters,
    next_id: AtomicU64,
    clock: AtomicU64,
    fail_next_fetch: AtomicBool,
    fail_next_mutation: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                collections: HashMap::new(),
                subscribers: HashMap::new(),
                auth: AuthState {
                    identity: None,
                    valid: false,
                    accounts: HashMap::new(),
                    listeners: HashMap::new(),
                    next_listener: 0,
                },
            }),
            counters: CallCounters::default(),
            next_id: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            fail_next_fetch: AtomicBool::new(false),
            fail_next_mutation: AtomicBool::new(false),
        }
    }

    /// Seeds a collection with the given records, as-is.
    pub fn seed(&self, collection: &str, records: Vec<Record>) {
        self.inner
            .lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
    }

    /// Registers an account for password authentication.
    pub fn add_account(&self, identity: &str, secret: &str, record: Record) {
        self.inner
            .lock()
            .auth
            .accounts
            .insert(identity.to_string(), (secret.to_string(), record));
    }

    /// Delivers an event to matching subscribers without touching the
    /// tables, simulating a change made by another client.
    pub fn emit(&self, collection: &str, event: RecordEvent) {
        self.notify(collection, event);
    }

    /// Makes the next fetch (`get_one`/`get_list`) fail with a transport
    /// error.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Makes the next mutation (`create`/`update`/`delete`) fail with a
    /// transport error.
    pub fn fail_next_mutation(&self) {
        self.fail_next_mutation.store(true, Ordering::SeqCst);
    }

    /// Number of `get_list` calls served.
    pub fn list_calls(&self) -> usize {
        self.counters.get_list.load(Ordering::SeqCst)
    }

    /// Number of `get_one` calls served.
    pub fn get_calls(&self) -> usize {
        self.counters.get_one.load(Ordering::SeqCst)
    }

    /// Number of `create` calls served.
    pub fn create_calls(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    /// Number of `update` calls served.
    pub fn update_calls(&self) -> usize {
        self.counters.update.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls served.
    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    /// Number of `subscribe` calls served.
    pub fn subscribe_calls(&self) -> usize {
        self.counters.subscribe.load(Ordering::SeqCst)
    }

    /// Number of `unsubscribe` calls served.
    pub fn unsubscribe_calls(&self) -> usize {
        self.counters.unsubscribe.load(Ordering::SeqCst)
    }

    /// Currently subscribed (collection, topic) pairs.
    pub fn subscription_topics(&self) -> Vec<(String, String)> {
        let mut topics: Vec<_> = self.inner.lock().subscribers.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns the stored records of a collection, in insertion order.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Forces the authenticated identity, notifying listeners.
    pub fn set_identity(&self, identity: Option<Record>) {
        let listeners = {
            let mut inner = self.inner.lock();
            inner.auth.valid = identity.is_some();
            inner.auth.identity = identity.clone();
            inner.auth.listeners.values().cloned().collect::<Vec<_>>()
        };
        for listener in listeners {
            listener(identity.clone());
        }
    }

    fn next_timestamp(&self) -> String {
        format!("t{}", self.clock.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn take_flag(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    fn matching_subscribers(&self, collection: &str, id: &str) -> Vec<EventCallback> {
        let inner = self.inner.lock();
        let mut callbacks = Vec::new();
        for ((sub_collection, topic), callback) in &inner.subscribers {
            if sub_collection == collection && (topic == "*" || topic == id) {
                callbacks.push(callback.clone());
            }
        }
        callbacks
    }

    fn notify(&self, collection: &str, event: RecordEvent) {
        let callbacks = self.matching_subscribers(collection, event.record.id.as_str());
        for callback in callbacks {
            callback(event.clone());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates the testkit's `field='value'` filter subset.
fn matches_filter(record: &Record, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let Some((name, rest)) = filter.split_once('=') else {
        return true;
    };
    let name = name.trim();
    let value = rest.trim().trim_matches('\'');

    if name == "id" {
        return record.id.as_str() == value;
    }
    match record.field(name) {
        Some(Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ready(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_one(
        &self,
        collection: &str,
        id: &RecordId,
        _options: &QueryOptions,
    ) -> StoreResult<Record> {
        self.counters.get_one.fetch_add(1, Ordering::SeqCst);
        if Self::take_flag(&self.fail_next_fetch) {
            return Err(StoreError::transport_retryable("injected fetch failure"));
        }
        let inner = self.inner.lock();
        inner
            .collections
            .get(collection)
            .and_then(|records| records.iter().find(|record| &record.id == id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id.as_str()))
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &QueryOptions,
    ) -> StoreResult<RecordPage> {
        self.counters.get_list.fetch_add(1, Ordering::SeqCst);
        if Self::take_flag(&self.fail_next_fetch) {
            return Err(StoreError::transport_retryable("injected fetch failure"));
        }
        let inner = self.inner.lock();
        let matching: Vec<Record> = inner
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| matches_filter(record, options.filter.as_deref()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let total_items = matching.len() as u64;
        let start = (page.max(1) - 1) as usize * per_page as usize;
        let items: Vec<Record> = matching
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        Ok(RecordPage::new(items, page, per_page, total_items))
    }

    async fn create(&self, collection: &str, fields: &FieldMap) -> StoreResult<Record> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        if Self::take_flag(&self.fail_next_mutation) {
            return Err(StoreError::transport_fatal("injected mutation failure"));
        }
        let id = format!("rec{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let timestamp = self.next_timestamp();

        let mut record = Record::new(id, collection);
        record.created = timestamp.clone();
        record.updated = timestamp;
        record.fields = fields.clone();

        self.inner
            .lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());

        self.notify(collection, RecordEvent::create(record.clone()));
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: &FieldMap,
    ) -> StoreResult<Record> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        if Self::take_flag(&self.fail_next_mutation) {
            return Err(StoreError::transport_fatal("injected mutation failure"));
        }
        let timestamp = self.next_timestamp();
        let updated = {
            let mut inner = self.inner.lock();
            let record = inner
                .collections
                .get_mut(collection)
                .and_then(|records| records.iter_mut().find(|record| &record.id == id))
                .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;
            record.merge(fields);
            record.updated = timestamp;
            record.clone()
        };

        self.notify(collection, RecordEvent::update(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> StoreResult<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        if Self::take_flag(&self.fail_next_mutation) {
            return Err(StoreError::transport_fatal("injected mutation failure"));
        }
        let removed = {
            let mut inner = self.inner.lock();
            let records = inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;
            let position = records
                .iter()
                .position(|record| &record.id == id)
                .ok_or_else(|| StoreError::not_found(collection, id.as_str()))?;
            records.remove(position)
        };

        self.notify(collection, RecordEvent::delete(removed));
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        callback: EventCallback,
    ) -> StoreResult<()> {
        self.counters.subscribe.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .subscribers
            .insert((collection.to_string(), topic.to_string()), callback);
        Ok(())
    }

    async fn unsubscribe(&self, collection: &str, topic: &str) -> StoreResult<()> {
        self.counters.unsubscribe.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .subscribers
            .remove(&(collection.to_string(), topic.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    fn identity(&self) -> Option<Record> {
        self.inner.lock().auth.identity.clone()
    }

    fn is_valid(&self) -> bool {
        self.inner.lock().auth.valid
    }

    async fn authenticate(&self, identity: &str, secret: &str) -> StoreResult<Record> {
        let (record, listeners) = {
            let mut inner = self.inner.lock();
            let record = match inner.auth.accounts.get(identity) {
                Some((expected, record)) if expected == secret => record.clone(),
                _ => return Err(StoreError::Unauthorized("invalid credentials".into())),
            };
            inner.auth.identity = Some(record.clone());
            inner.auth.valid = true;
            let listeners = inner.auth.listeners.values().cloned().collect::<Vec<_>>();
            (record, listeners)
        };
        for listener in listeners {
            listener(Some(record.clone()));
        }
        Ok(record)
    }

    fn clear_session(&self) {
        let listeners = {
            let mut inner = self.inner.lock();
            inner.auth.identity = None;
            inner.auth.valid = false;
            inner.auth.listeners.values().cloned().collect::<Vec<_>>()
        };
        for listener in listeners {
            listener(None);
        }
    }

    fn on_change(&self, callback: AuthCallback) -> AuthListenerId {
        let mut inner = self.inner.lock();
        let id = inner.auth.next_listener;
        inner.auth.next_listener += 1;
        inner.auth.listeners.insert(id, callback);
        AuthListenerId(id)
    }

    fn remove_listener(&self, id: AuthListenerId) {
        self.inner.lock().auth.listeners.remove(&id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fields, record_with};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let record = store
            .create("posts", &fields(&[("title", json!("x"))]))
            .await
            .unwrap();
        assert_eq!(record.id.as_str(), "rec1");
        assert_eq!(record.created, record.updated);
        assert!(!record.created.is_empty());
    }

    #[tokio::test]
    async fn update_merges_and_bumps_timestamp() {
        let store = MemoryStore::new();
        let created = store
            .create("posts", &fields(&[("title", json!("x"))]))
            .await
            .unwrap();
        let updated = store
            .update("posts", &created.id, &fields(&[("draft", json!(true))]))
            .await
            .unwrap();
        assert_eq!(updated.field("title"), Some(&json!("x")));
        assert_eq!(updated.field("draft"), Some(&json!(true)));
        assert_ne!(updated.updated, created.updated);
    }

    #[tokio::test]
    async fn get_list_filters_and_pages() {
        let store = MemoryStore::new();
        store.seed(
            "posts",
            vec![
                record_with("a", "posts", &[("status", json!("open"))]),
                record_with("b", "posts", &[("status", json!("done"))]),
                record_with("c", "posts", &[("status", json!("open"))]),
            ],
        );

        let options = QueryOptions::new().with_filter("status='open'");
        let page = store.get_list("posts", 1, 1, &options).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, RecordId::new("a"));
    }

    #[tokio::test]
    async fn mutations_fan_out_to_wildcard_subscribers() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        store
            .subscribe(
                "posts",
                "*",
                Arc::new(move |event| seen_clone.lock().push(event.action)),
            )
            .await
            .unwrap();

        let record = store.create("posts", &FieldMap::new()).await.unwrap();
        store
            .update("posts", &record.id, &FieldMap::new())
            .await
            .unwrap();
        store.delete("posts", &record.id).await.unwrap();

        use docmirror_store::EventAction::*;
        assert_eq!(*seen.lock(), vec![Create, Update, Delete]);
    }

    #[tokio::test]
    async fn topic_subscribers_only_see_their_record() {
        let store = MemoryStore::new();
        store.seed("posts", vec![record_with("a", "posts", &[])]);
        let seen = Arc::new(Mutex::new(0usize));

        let seen_clone = Arc::clone(&seen);
        store
            .subscribe("posts", "a", Arc::new(move |_| *seen_clone.lock() += 1))
            .await
            .unwrap();

        store.create("posts", &FieldMap::new()).await.unwrap();
        assert_eq!(*seen.lock(), 0);

        store
            .update("posts", &RecordId::new("a"), &FieldMap::new())
            .await
            .unwrap();
        assert_eq!(*seen.lock(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_one_shot() {
        let store = MemoryStore::new();
        store.seed("posts", vec![record_with("a", "posts", &[])]);

        store.fail_next_fetch();
        let err = store
            .get_one("posts", &RecordId::new("a"), &QueryOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // Next fetch succeeds again.
        store
            .get_one("posts", &RecordId::new("a"), &QueryOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn authenticate_and_clear_notify_listeners() {
        let store = MemoryStore::new();
        store.add_account("alice", "secret", record_with("u1", "users", &[]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let id = store.on_change(Arc::new(move |identity| {
            seen_clone.lock().push(identity.is_some());
        }));

        assert!(store.authenticate("alice", "wrong").await.is_err());
        store.authenticate("alice", "secret").await.unwrap();
        assert!(store.is_valid());
        store.clear_session();
        assert!(!store.is_valid());

        assert_eq!(*seen.lock(), vec![true, false]);
        store.remove_listener(id);
    }
}
