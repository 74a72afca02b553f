/// Authentication: the identity provider seam and the gate the session talks to.
///
/// The session never calls the identity provider directly; every bearer
/// header is minted through `AuthGate`.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod firebase;
pub mod gate;

pub use gate::{AuthGate, AuthSnapshot};

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User is not authenticated.")]
    NotAuthenticated,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Message reported by the identity provider, e.g. `INVALID_PASSWORD`.
    #[error("{0}")]
    Provider(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Something that can hand out a currently valid ID token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> Result<String, AuthError>;
}

/// The signed-in user.
#[derive(Clone)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
    tokens: Arc<dyn TokenSource>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: Option<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            id: id.into(),
            email,
            tokens,
        }
    }

    pub async fn mint_token(&self) -> Result<String, AuthError> {
        self.tokens.id_token().await
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Called with the new principal (or `None`) on every sign-in/sign-out.
pub type AuthListener = Box<dyn Fn(Option<Principal>) + Send + Sync>;

/// The external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers a listener. Implementations must invoke it once right away
    /// with the current principal, then on every change.
    fn on_auth_state_changed(&self, listener: AuthListener);

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Headers attached to one backend request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    /// Full header value, `Bearer <token>`.
    pub authorization: String,
    pub content_type: Option<&'static str>,
}

impl AuthHeaders {
    pub fn bearer(token: &str, multipart: bool) -> Self {
        Self {
            authorization: format!("Bearer {token}"),
            content_type: multipart.then_some(MULTIPART_FORM_DATA),
        }
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("authorization", &"Bearer <redacted>")
            .field("content_type", &self.content_type)
            .finish()
    }
}
