//! The trait boundary to the remote document store.
//!
//! These traits abstract the wire client, allowing different implementations
//! (HTTP, WebSocket-backed, in-memory for testing) behind one seam. All remote
//! calls are async; docmirror never blocks on them.

use crate::error::StoreResult;
use crate::event::EventCallback;
use crate::query::{QueryOptions, RecordPage};
use crate::record::{FieldMap, Record, RecordId};
use async_trait::async_trait;
use std::sync::Arc;

/// Subscription topic covering every record in a collection.
pub const WILDCARD_TOPIC: &str = "*";

/// A remote document store exposing CRUD, paginated queries, and a live
/// change channel.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Resolves once the store is ready to serve requests.
    ///
    /// Awaited exactly once per adapter before the first fetch or
    /// subscription; trivially `Ok(())` for stores with no bootstrap phase.
    async fn ready(&self) -> StoreResult<()>;

    /// Retrieves a single record by identifier.
    async fn get_one(
        &self,
        collection: &str,
        id: &RecordId,
        options: &QueryOptions,
    ) -> StoreResult<Record>;

    /// Retrieves one page of a filtered/sorted list query.
    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &QueryOptions,
    ) -> StoreResult<RecordPage>;

    /// Creates a record from a partial field mapping.
    async fn create(&self, collection: &str, fields: &FieldMap) -> StoreResult<Record>;

    /// Updates a record by identifier with a partial field mapping.
    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: &FieldMap,
    ) -> StoreResult<Record>;

    /// Deletes a record by identifier.
    async fn delete(&self, collection: &str, id: &RecordId) -> StoreResult<()>;

    /// Opens a live channel for a topic (a record id or [`WILDCARD_TOPIC`]).
    ///
    /// The callback is invoked for every event until the topic is
    /// unsubscribed. Callbacks may fire at any point after this resolves,
    /// interleaved with caller-initiated operations.
    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        callback: EventCallback,
    ) -> StoreResult<()>;

    /// Tears down the live channel for a topic.
    async fn unsubscribe(&self, collection: &str, topic: &str) -> StoreResult<()>;
}

/// Identifies a registered identity-change listener so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthListenerId(pub u64);

/// Callback invoked whenever the authenticated identity changes.
///
/// Receives the new identity, or `None` after logout/session expiry.
pub type AuthCallback = Arc<dyn Fn(Option<Record>) + Send + Sync>;

/// The store's global authentication facade.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Returns the currently authenticated identity, if any.
    fn identity(&self) -> Option<Record>;

    /// Returns true if the current session token is valid.
    fn is_valid(&self) -> bool;

    /// Performs password authentication and returns the identity record.
    async fn authenticate(&self, identity: &str, secret: &str) -> StoreResult<Record>;

    /// Clears the current session.
    ///
    /// Registered listeners observe the cleared state; the call itself does
    /// not fail.
    fn clear_session(&self);

    /// Registers an identity-change listener, fired on login, logout, and
    /// token refresh.
    fn on_change(&self, callback: AuthCallback) -> AuthListenerId;

    /// Removes a previously registered identity-change listener.
    fn remove_listener(&self, id: AuthListenerId);
}
