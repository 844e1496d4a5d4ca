//! Mapping of provider errors into the client-facing taxonomy.
//!
//! The provider layer reports transport-level outcomes; which taxonomy
//! bucket they land in depends on the operation kind, so the mapping happens
//! here at the call site.

use lookym_api::ApiError;
use lookym_shared::ClientError;

pub(crate) fn auth_err(e: ApiError) -> ClientError {
    match e {
        ApiError::InvalidCredentials => ClientError::Auth("invalid email or password".into()),
        other => ClientError::Auth(other.to_string()),
    }
}

pub(crate) fn fetch_err(e: ApiError) -> ClientError {
    ClientError::Fetch(e.to_string())
}

pub(crate) fn write_err(e: ApiError) -> ClientError {
    ClientError::Write(e.to_string())
}
