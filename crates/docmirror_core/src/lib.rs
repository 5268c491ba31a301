//! # docmirror Core
//!
//! A client-side reactive caching layer that keeps locally observed
//! representations of remote documents and collections synchronized with a
//! backend document store: pull (fetch) when idle, push (subscription) when
//! listen mode is enabled.
//!
//! This crate provides:
//! - A reactive [`Cell`] with watcher and attach/detach lifecycle semantics
//! - The generic [`Resource`] state machine over injected
//!   [`ResourceStrategy`] fetch/subscribe operations
//! - [`DocumentView`]: a single record with save/patch/autosave
//! - [`CollectionView`]: a paginated record list with optimistic CRUD and
//!   patch-in-place live reconciliation
//! - [`AuthView`]: the store's authentication identity as a reactive value
//!
//! ## Key invariants
//!
//! - Each adapter instance exclusively owns its snapshot/loading/error state
//! - At most one live subscription per adapter; opened on first attach,
//!   closed on last detach
//! - Fetch-path failures are captured, never thrown; mutation-path failures
//!   are captured and returned
//! - Reconciliation patches in place and never re-sorts or re-pages locally

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod cell;
mod collection;
mod document;
mod error;
mod resource;

pub use auth::AuthView;
pub use cell::{Cell, Snapshot, WatchId};
pub use collection::{
    reconcile, CollectionConfig, CollectionView, PageState, DEFAULT_PER_PAGE,
};
pub use document::{DocumentConfig, DocumentView};
pub use error::{CacheError, CacheResult};
pub use resource::{Resource, ResourceState, ResourceStrategy, Subscription};
