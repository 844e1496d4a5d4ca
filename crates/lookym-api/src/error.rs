use thiserror::Error;

/// Errors produced by the backend and CDN providers.
///
/// The state containers translate these into the client-facing taxonomy
/// (`ClientError`) at the call site, where the operation kind (fetch vs.
/// write vs. auth) is known.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection-level failure (DNS, TLS, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend rejected the request ({status}): {message}")]
    Status { status: u16, message: String },

    /// The identity provider rejected the supplied credentials.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// An operation that needs a session was called without one.
    #[error("No active session")]
    NoSession,

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// A single-row query matched nothing.
    #[error("Row not found")]
    NotFound,

    /// Reading a local media file for upload failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configured endpoint URL failed to parse.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
