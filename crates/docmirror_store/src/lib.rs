//! # docmirror Store
//!
//! Boundary types and traits for the remote document store that docmirror
//! synchronizes against.
//!
//! This crate provides:
//! - The [`Record`] model (stable identifier, server-assigned timestamps,
//!   opaque client-writable fields)
//! - Query options and paginated list results
//! - Live change events (`create`/`update`/`delete`)
//! - The [`RecordStore`] and [`AuthStore`] traits that concrete backends
//!   (HTTP client, in-memory test store, ...) implement
//!
//! No synchronization logic lives here; see `docmirror_core` for the caching
//! state machine built on top of these traits.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod query;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use event::{EventAction, EventCallback, RecordEvent};
pub use query::{QueryOptions, RecordPage};
pub use record::{FieldMap, Record, RecordId};
pub use store::{AuthCallback, AuthListenerId, AuthStore, RecordStore, WILDCARD_TOPIC};
