//! Firebase email/password identity over the public REST APIs.
//!
//! Sign-in and sign-up go to the Identity Toolkit; ID tokens are refreshed
//! through the Secure Token service shortly before they expire.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AuthError, AuthListener, IdentityProvider, Principal, TokenSource};
use crate::config::Config;

/// Tokens are refreshed this long before their stated expiry.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
/// Firebase ID tokens live for an hour unless the response says otherwise.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseError {
    error: FirebaseErrorBody,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    message: String,
}

#[derive(Clone)]
struct Endpoints {
    http: Client,
    api_key: String,
    identity_url: String,
    token_url: String,
}

type SharedListener = Arc<dyn Fn(Option<Principal>) + Send + Sync>;

/// Identity provider backed by Firebase Authentication.
pub struct FirebaseIdentity {
    endpoints: Endpoints,
    current: Mutex<Option<Principal>>,
    listeners: Mutex<Vec<SharedListener>>,
}

impl FirebaseIdentity {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            endpoints: Endpoints {
                http: builder.build()?,
                api_key: config.firebase_api_key.clone(),
                identity_url: config.identity_url.clone(),
                token_url: config.token_url.clone(),
            },
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        })
    }

    async fn password_auth(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let url = format!("{}/v1/accounts:{method}", self.endpoints.identity_url);
        let response = self
            .endpoints
            .http
            .post(&url)
            .query(&[("key", self.endpoints.api_key.as_str())])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let body: PasswordResponse = read_json(response).await?;
        info!("Firebase {method} succeeded for {}", body.local_id);

        let tokens = FirebaseTokens {
            endpoints: self.endpoints.clone(),
            state: tokio::sync::Mutex::new(TokenState::new(
                body.id_token,
                body.refresh_token,
                body.expires_in.as_deref(),
            )),
        };
        let principal = Principal::new(body.local_id, body.email, Arc::new(tokens));

        self.set_current(Some(principal.clone()));
        Ok(principal)
    }

    fn set_current(&self, principal: Option<Principal>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = principal.clone();

        // Listeners run outside the lock so they may call back into the provider.
        let listeners: Vec<SharedListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(principal.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    fn on_auth_state_changed(&self, listener: AuthListener) {
        let listener: SharedListener = Arc::from(listener);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&listener));

        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        listener(current);
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.password_auth("signInWithPassword", email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.password_auth("signUp", email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Firebase has no server-side sign-out for ID tokens; dropping them is enough.
        self.set_current(None);
        Ok(())
    }
}

struct TokenState {
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenState {
    fn new(id_token: String, refresh_token: String, expires_in: Option<&str>) -> Self {
        let lifetime = expires_in
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Self {
            id_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        }
    }

    fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Per-user token source. Reuses the ID token until it is close to expiry.
struct FirebaseTokens {
    endpoints: Endpoints,
    state: tokio::sync::Mutex<TokenState>,
}

#[async_trait]
impl TokenSource for FirebaseTokens {
    async fn id_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if state.is_fresh() {
            return Ok(state.id_token.clone());
        }

        debug!("ID token near expiry, refreshing");
        let url = format!("{}/v1/token", self.endpoints.token_url);
        let response = self
            .endpoints
            .http
            .post(&url)
            .query(&[("key", self.endpoints.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let body: RefreshResponse = read_json(response).await?;
        *state = TokenState::new(body.id_token, body.refresh_token, body.expires_in.as_deref());
        Ok(state.id_token.clone())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<FirebaseError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("identity provider returned {status}"));
        warn!("Firebase request rejected: {message}");
        return Err(AuthError::Provider(message));
    }

    Ok(serde_json::from_str(&body)?)
}
