use std::time::{SystemTime, UNIX_EPOCH};

use credentials::TokenPair;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::{ApiClient, ApiRequest};
use crate::error::ApiError;
use crate::events::SessionEvent;
use crate::models::{JwtPairResponse, User};

pub const LOGIN_PATH: &str = "/auth/jwt/create/";
pub const VERIFY_PATH: &str = "/auth/jwt/verify/";
pub const REGISTER_PATH: &str = "/auth/users/";
pub const ME_PATH: &str = "/auth/users/me/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub re_password: String,
}

/// Result of a successful login: the tokens are stored either way; the
/// profile may still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub user: Option<User>,
    pub profile_error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

/// Account-level operations on top of an [`ApiClient`].
#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    user: Mutex<Option<User>>,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            user: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.context().is_authenticated()
    }

    pub fn auth_state(&self) -> AuthState {
        let is_authenticated = self.is_authenticated();
        AuthState {
            user: if is_authenticated {
                self.user.lock().clone()
            } else {
                None
            },
            is_authenticated,
        }
    }

    /// Expiry of the stored access token as a unix timestamp, if it carries one.
    pub fn access_token_expires_at(&self) -> Option<u64> {
        credentials::jwt::expires_at(&self.client.context().access_token()?)
    }

    pub fn access_token_expired(&self) -> bool {
        let Some(token) = self.client.context().access_token() else {
            return true;
        };
        credentials::jwt::is_expired(&token, unix_now())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let req = ApiRequest::post(LOGIN_PATH)
            .json(json!({ "username": username, "password": password }))
            .without_refresh();

        let pair: JwtPairResponse = match self.client.json(req).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("login failed for {username}: {err}");
                self.client.context().clear_tokens();
                *self.user.lock() = None;
                return Err(err);
            }
        };

        self.client
            .context()
            .store_pair(&TokenPair::new(pair.access, pair.refresh))?;
        info!("logged in as {username}");
        self.client.context().emit(SessionEvent::LoggedIn {
            username: username.to_string(),
        });

        Ok(self.load_profile().await)
    }

    /// Creates the account, then logs straight in with the same credentials.
    pub async fn register(&self, form: &RegisterForm) -> Result<LoginOutcome, ApiError> {
        if form.username.trim().is_empty() {
            return Err(ApiError::Invalid("username is required".to_string()));
        }
        if form.password != form.re_password {
            return Err(ApiError::Invalid("passwords do not match".to_string()));
        }

        let body = serde_json::to_value(form).map_err(|e| ApiError::Invalid(e.to_string()))?;
        let req = ApiRequest::post(REGISTER_PATH).json(body).without_refresh();
        if let Err(err) = self.client.execute(req).await {
            warn!("registration failed for {}: {err}", form.username);
            self.client.context().clear_tokens();
            *self.user.lock() = None;
            return Err(err);
        }
        self.client.context().emit(SessionEvent::Registered {
            username: form.username.clone(),
        });

        self.login(&form.username, &form.password).await
    }

    /// JWT logout is purely local: there is no server session to end.
    pub fn logout(&self) {
        self.client.context().clear_tokens();
        *self.user.lock() = None;
        self.client.context().emit(SessionEvent::LoggedOut);
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let user = self.client.users().me().await?;
        *self.user.lock() = Some(user.clone());
        Ok(user)
    }

    pub async fn verify_token(&self, token: &str) -> Result<bool, ApiError> {
        let req = ApiRequest::post(VERIFY_PATH)
            .json(json!({ "token": token }))
            .without_refresh();
        match self.client.execute(req).await {
            Ok(()) => Ok(true),
            Err(ApiError::Unauthorized) => Ok(false),
            Err(ApiError::Status { status: 400, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn load_profile(&self) -> LoginOutcome {
        match self.current_user().await {
            Ok(user) => LoginOutcome {
                user: Some(user),
                profile_error: None,
            },
            Err(err) => {
                warn!("profile unavailable after login: {err}");
                LoginOutcome {
                    user: None,
                    profile_error: Some(err),
                }
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
