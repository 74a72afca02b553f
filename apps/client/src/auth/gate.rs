use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::auth::{AuthError, AuthHeaders, IdentityProvider, Principal};

/// What the gate currently knows about the user.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    /// True until the provider has reported for the first time.
    pub loading: bool,
    pub principal: Option<Principal>,
}

/// Wraps the identity provider: observable principal plus on-demand bearer headers.
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot {
            loading: true,
            principal: None,
        });
        let state = Arc::new(tx);

        let listener_state = Arc::clone(&state);
        provider.on_auth_state_changed(Box::new(move |principal| {
            match &principal {
                Some(p) => info!("Auth state: signed in as {}", p.id),
                None => info!("Auth state: signed out"),
            }
            listener_state.send_replace(AuthSnapshot {
                loading: false,
                principal,
            });
        }));

        Self { provider, state }
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.state.borrow().principal.clone()
    }

    #[allow(dead_code)]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// A receiver that observes every auth transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Mints a fresh bearer header set for one request.
    /// Tokens are not cached here; the principal's token source decides.
    pub async fn mint_auth_headers(&self, multipart: bool) -> Result<AuthHeaders, AuthError> {
        let principal = self.current_principal().ok_or(AuthError::NotAuthenticated)?;
        let token = principal.mint_token().await?;
        debug!("Minted bearer token for {}", principal.id);
        Ok(AuthHeaders::bearer(&token, multipart))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.provider.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.provider.sign_up(email, password).await
    }

    /// Fire-and-forget. Failures are logged, never returned.
    pub fn sign_out(&self) {
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(e) = provider.sign_out().await {
                error!("Sign out error: {e}");
            }
        });
    }
}
