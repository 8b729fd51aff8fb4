//! # onebridge-store
//!
//! Persisted bookkeeping for files the bridge has already materialised.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers over the `file_cache`
//! table, mapping an original URI to the local path it was saved under.

pub mod database;
pub mod file_cache;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
