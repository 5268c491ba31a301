//! # docmirror Testkit
//!
//! Test utilities for docmirror.
//!
//! This crate provides:
//! - [`MemoryStore`]: an in-memory [`docmirror_store::RecordStore`] and
//!   [`docmirror_store::AuthStore`] with call counters, failure injection,
//!   and live-event fan-out
//! - Record and field-map fixtures shared across the workspace's tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod memory;

pub use fixtures::{fields, record_with};
pub use memory::MemoryStore;
