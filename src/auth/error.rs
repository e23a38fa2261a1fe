use thiserror::Error;

use crate::auth::store::StoreError;

/// Domain-level authentication failures. Unknown username and wrong
/// password are deliberately merged into `InvalidCredentials` so callers
/// cannot enumerate usernames.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("email already in use")]
    DuplicateEmail,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unsupported grant type")]
    UnsupportedGrantType,

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err)
    }
}
