//! # lookym-api
//!
//! Typed clients for the two external collaborators of the LOOKYM client
//! core: the hosted backend (authentication plus a row-level relational API)
//! and the media CDN used by the creator-upload flow.
//!
//! Both collaborators are consumed through traits so the state containers in
//! `lookym-client` can run against the real REST providers or the in-memory
//! providers used by tests and offline development.

pub mod backend;
pub mod config;
pub mod media;
pub mod memory;
pub mod rest;

mod error;
mod rows;

pub use backend::{AuthSession, Backend, NewMessage, NewVideo, ProfileChanges};
pub use config::BackendConfig;
pub use error::ApiError;
pub use media::{MediaCdn, MemoryCdn, RestCdn, UploadedMedia};
pub use memory::MemoryBackend;
pub use rest::RestBackend;
