use thiserror::Error;

use crate::api_client::RequestError;
use crate::auth::AuthError;

/// Session-level error type.
/// Every failure the controller records in a request slot is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Missing or out-of-range user input, caught before any network call.
    #[error("{0}")]
    Validation(String),

    /// The action needs an earlier successful result that is absent.
    #[error("{0}")]
    Precondition(String),

    #[error("User is not authenticated.")]
    NotAuthenticated,

    /// The identity provider could not mint a token for the signed-in user.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

impl SessionError {
    /// Short machine-readable code, used in logs and the rendered report.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "VALIDATION_ERROR",
            SessionError::Precondition(_) => "PRECONDITION_ERROR",
            SessionError::NotAuthenticated => "NOT_AUTHENTICATED",
            SessionError::Auth(_) => "AUTH_ERROR",
            SessionError::Request(e) => e.kind.code(),
        }
    }
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated => SessionError::NotAuthenticated,
            other => SessionError::Auth(other.to_string()),
        }
    }
}
