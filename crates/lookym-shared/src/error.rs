use thiserror::Error;

use crate::models::Role;

/// Failures surfaced by the state containers to the presentation layer.
///
/// `Validation` and `Authorization` are raised synchronously before any
/// network call; the remaining variants wrap backend outcomes.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Credential or session failure from the identity provider.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Caller-supplied data failed a precondition.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The operation requires a signed-in identity and none is present.
    #[error("No user is signed in")]
    NotAuthenticated,

    /// The signed-in identity lacks the required role.
    #[error("Operation requires the {0} role")]
    Authorization(Role),

    /// A backend read failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A backend write failed.
    #[error("Write failed: {0}")]
    Write(String),
}

/// Convenience alias used by the state containers.
pub type Result<T> = std::result::Result<T, ClientError>;
