//! # lookym-shared
//!
//! Domain models and the failure taxonomy shared by every LOOKYM crate.
//!
//! Everything here is plain data: the state containers in `lookym-client`
//! own the behavior, the backend providers in `lookym-api` own the wire
//! mapping, and this crate sits at the root of the dependency graph.

pub mod error;
pub mod models;

pub use error::ClientError;
pub use models::*;
