//! # lookym-store
//!
//! Device-local persistence for the LOOKYM client, backed by SQLite.
//!
//! Each state container durably caches a whitelisted snapshot of its state
//! (one JSON row per container) so the app can rehydrate across restarts
//! before any network call completes. The persisted copy is a cache: it is
//! never treated as more authoritative than a successful server response.

pub mod database;
pub mod migrations;
pub mod snapshots;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use snapshots::{AuthSnapshot, FeedSnapshot, VideoSnapshot};
