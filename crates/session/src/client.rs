use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::context::SessionContext;
use crate::error::ApiError;
use crate::events::SessionEvent;
use crate::form::MultipartForm;
use crate::refresh::Role;

pub const REFRESH_PATH: &str = "/auth/jwt/refresh/";

/// One backend call, kept as data so it can be replayed after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub form: Option<MultipartForm>,
    pub timeout: Option<Duration>,
    /// Set once the request has been through the refresh cycle (or must
    /// never enter it). A 401 on such a request is final.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            form: None,
            timeout: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.form = Some(form);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Credentials endpoints: a 401 means bad credentials, not a stale token.
    pub fn without_refresh(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// Raw bytes plus the content type the backend declared.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBytes {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// HTTP client bound to one [`SessionContext`].
///
/// Cloning is cheap and every clone shares the context, so the single
/// in-flight refresh guarantee holds across all of them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ApiConfig>,
    ctx: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, ctx: Arc<SessionContext>) -> Self {
        Self::with_http(reqwest::Client::new(), config, ctx)
    }

    pub fn with_http(http: reqwest::Client, config: ApiConfig, ctx: Arc<SessionContext>) -> Self {
        Self {
            http,
            config: Arc::new(config),
            ctx,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Sets the bearer header from the stored access token, if there is one.
    ///
    /// Returns the token that was attached so a later 401 can be matched
    /// against the token that caused it.
    pub fn attach_token(&self, builder: RequestBuilder) -> (RequestBuilder, Option<String>) {
        match self.ctx.access_token() {
            Some(token) => (builder.bearer_auth(&token), Some(token)),
            None => (builder, None),
        }
    }

    fn build(&self, request: &ApiRequest) -> Result<RequestBuilder, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.config.url(&request.path))
            .timeout(request.timeout.unwrap_or(self.config.request_timeout));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(form) = &request.form {
            builder = builder.multipart(form.to_reqwest()?);
        }
        Ok(builder)
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        builder.send().await.map_err(ApiError::from_reqwest)
    }

    /// Sends `request` with the current token; a first 401 goes through
    /// [`ApiClient::handle_unauthorized`] and is never seen by the caller.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let (builder, sent_token) = self.attach_token(self.build(&request)?);
        let resp = self.dispatch(builder).await?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }
        if request.retried {
            debug!(path = %request.path, "401 on retried request");
            return Err(ApiError::Unauthorized);
        }
        self.handle_unauthorized(request, sent_token).await
    }

    /// Recovers from a 401 by refreshing (or waiting on the refresh already
    /// in flight) and replaying `request` exactly once.
    pub async fn handle_unauthorized(
        &self,
        mut request: ApiRequest,
        sent_token: Option<String>,
    ) -> Result<Response, ApiError> {
        request.retried = true;

        let role = self.ctx.refresh().begin(|| {
            let current = self.ctx.access_token()?;
            (sent_token.as_deref() != Some(current.as_str())).then_some(current)
        });

        let token = match role {
            Role::Replay(token) => {
                debug!(path = %request.path, "token changed since send, replaying");
                token
            }
            Role::Waiter(rx) => rx
                .await
                .map_err(|_| ApiError::Transport("refresh abandoned".to_string()))??,
            Role::Refresher(ticket) => {
                let result = self.refresh_access().await;
                ticket.finish(result.clone());
                result?
            }
        };

        let resp = self.dispatch(self.build(&request)?.bearer_auth(&token)).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "request still unauthorized after refresh");
            return Err(ApiError::Unauthorized);
        }
        check_status(resp).await
    }

    /// The one network refresh call. Any failure ends the session.
    async fn refresh_access(&self) -> Result<String, ApiError> {
        let Some(refresh) = self.ctx.refresh_token() else {
            self.ctx.expire("no refresh token");
            return Err(ApiError::SessionInvalid);
        };

        info!("refreshing access token");
        let resp = self
            .http
            .post(self.config.url(REFRESH_PATH))
            .timeout(self.config.request_timeout)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await;

        let access = match resp {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<RefreshResponse>().await {
                    Ok(body) => body.access,
                    Err(err) => {
                        self.ctx.expire(format!("refresh response unreadable: {err}"));
                        return Err(ApiError::SessionInvalid);
                    }
                }
            }
            Ok(resp) => {
                self.ctx
                    .expire(format!("refresh rejected with HTTP {}", resp.status()));
                return Err(ApiError::SessionInvalid);
            }
            Err(err) => {
                self.ctx.expire(format!("refresh failed: {err}"));
                return Err(ApiError::SessionInvalid);
            }
        };

        // Refresh token stays as it was.
        if let Err(err) = self.ctx.store_access(&access) {
            self.ctx
                .expire(format!("storing refreshed token failed: {err}"));
            return Err(ApiError::SessionInvalid);
        }
        self.ctx.emit(SessionEvent::TokenRefreshed);
        Ok(access)
    }

    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let resp = self.send(request).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// For endpoints whose body the caller does not need.
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    pub async fn bytes(&self, request: ApiRequest) -> Result<RasterBytes, ApiError> {
        let resp = self.send(request).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await.map_err(ApiError::from_reqwest)?;
        Ok(RasterBytes {
            bytes,
            content_type,
        })
    }
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Err(ApiError::Timeout),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate(body, 512),
            })
        }
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
