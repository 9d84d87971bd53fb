//! In-process stand-in for the REST backend.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use credentials::{InMemoryTokenStore, TokenPair, TokenStore};
use parking_lot::Mutex;
use serde_json::{Value, json};
use session::{ApiClient, ApiConfig, SessionContext};

pub const REFRESH_TOKEN: &str = "refresh-1";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

pub struct BackendState {
    pub accepted_access: Mutex<String>,
    pub next_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_ok: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub me_ok: AtomicBool,
    pub always_unauthorized: AtomicBool,
    pub register_calls: AtomicUsize,
    pub anonymous_hits: AtomicUsize,
    pub raster_delay_ms: AtomicU64,
    pub last_query: Mutex<Vec<(String, String)>>,
    pub last_json: Mutex<Option<Value>>,
    /// Multipart fields of the last upload; files appear as `name=file_name:len`.
    pub last_form: Mutex<Vec<(String, String)>>,
    pub upload_attempts: AtomicUsize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            accepted_access: Mutex::new("access-1".to_string()),
            next_access: Mutex::new("access-2".to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            refresh_delay_ms: AtomicU64::new(0),
            me_ok: AtomicBool::new(true),
            always_unauthorized: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            anonymous_hits: AtomicUsize::new(0),
            raster_delay_ms: AtomicU64::new(0),
            last_query: Mutex::new(Vec::new()),
            last_json: Mutex::new(None),
            last_form: Mutex::new(Vec::new()),
            upload_attempts: AtomicUsize::new(0),
        }
    }
}

impl BackendState {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

pub struct Backend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl Backend {
    pub async fn start() -> Self {
        Self::start_with(BackendState::default()).await
    }

    pub async fn start_with(state: BackendState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/api/auth/jwt/create/", post(jwt_create))
            .route("/api/auth/jwt/refresh/", post(jwt_refresh))
            .route("/api/auth/jwt/verify/", post(jwt_verify))
            .route("/api/auth/users/", post(register))
            .route("/api/auth/users/me/", get(me))
            .route("/api/auth/users/reset-password-confirm/", post(account_action))
            .route("/api/auth/users/activation/", post(account_action))
            .route("/api/auth/users/resend-activation/", post(account_action))
            .route("/api/pipelines/", get(pipelines).post(create_pipeline))
            .route("/api/anomalies/", get(anomalies))
            .route("/api/notifications/unread_count/", get(unread_count))
            .route("/api/satellite-images/", post(create_image))
            .route("/api/satellite-images/:id/", get(satellite_image).put(update_image))
            .route("/api/satellite-images/:id/display_image/", get(display_image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(format!("http://{}/api", self.addr))
    }

    pub fn client_with(&self, store: impl TokenStore + 'static) -> ApiClient {
        ApiClient::new(self.config(), SessionContext::new(store))
    }

    /// Client holding a pair whose access token the backend no longer accepts.
    pub fn client_with_stale_token(&self) -> ApiClient {
        self.client_with(InMemoryTokenStore::with_pair(&TokenPair::new(
            "stale",
            REFRESH_TOKEN,
        )))
    }

    pub fn client_without_refresh_token(&self) -> ApiClient {
        let mut store = InMemoryTokenStore::new();
        store.store_access("stale").unwrap();
        self.client_with(store)
    }
}

type Shared = State<Arc<BackendState>>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authorized(state: &BackendState, headers: &HeaderMap) -> bool {
    let Some(token) = bearer(headers) else {
        state.anonymous_hits.fetch_add(1, Ordering::SeqCst);
        return false;
    };
    token == *state.accepted_access.lock()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type" })),
    )
        .into_response()
}

async fn jwt_create(State(state): Shared, Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found" })),
        )
            .into_response();
    }
    let access = state.accepted_access.lock().clone();
    Json(json!({ "access": access, "refresh": REFRESH_TOKEN })).into_response()
}

async fn jwt_refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !state.refresh_ok.load(Ordering::SeqCst) || body["refresh"] != REFRESH_TOKEN {
        return unauthorized();
    }
    let next = state.next_access.lock().clone();
    *state.accepted_access.lock() = next.clone();
    Json(json!({ "access": next })).into_response()
}

async fn jwt_verify(State(state): Shared, Json(body): Json<Value>) -> Response {
    if body["token"] == *state.accepted_access.lock() {
        Json(json!({})).into_response()
    } else {
        unauthorized()
    }
}

async fn register(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.register_calls.fetch_add(1, Ordering::SeqCst);
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "username": ["A user with that username already exists."] })),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({ "id": 7, "username": body["username"], "email": body["email"] })),
    )
        .into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    if !state.me_ok.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "profile service down").into_response();
    }
    Json(json!({
        "id": 7,
        "username": "ada",
        "email": "ada@example.com",
        "first_name": "Ada",
        "last_name": "Okafor"
    }))
    .into_response()
}

async fn pipelines(State(state): Shared, headers: HeaderMap) -> Response {
    if state.always_unauthorized.load(Ordering::SeqCst) || !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({
        "count": 1,
        "next": null,
        "previous": null,
        "results": [{
            "id": "p-1",
            "name": "Trans-Niger",
            "status": "active",
            "length_km": 180.5,
            "satellite_images_count": 2
        }]
    }))
    .into_response()
}

async fn anomalies(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    *state.last_query.lock() = query;
    Json(json!([{
        "id": "an-1",
        "analysis": "a-1",
        "anomaly_type": "oil_spill",
        "severity": "high",
        "location_lat": 4.8,
        "location_lon": 7.0,
        "confidence_score": 0.91,
        "is_resolved": false
    }]))
    .into_response()
}

async fn unread_count(State(state): Shared, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({ "unread_count": 3 })).into_response()
}

async fn satellite_image(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    if id != "img-1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response();
    }
    Json(json!({
        "id": "img-1",
        "name": "Bonny 2024-03",
        "is_cog_converted": true,
        "bbox": { "minx": 7.0, "miny": 4.4, "maxx": 7.3, "maxy": 4.7 }
    }))
    .into_response()
}

async fn display_image(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let delay = state.raster_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if id != "img-1" {
        return (StatusCode::NOT_FOUND, "missing raster").into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}

/// Djoser account endpoints: anonymous, 204 on success, 400 for a bad token.
async fn account_action(State(state): Shared, Json(body): Json<Value>) -> Response {
    let bad_token = body["token"] == "bad";
    *state.last_json.lock() = Some(body);
    if bad_token {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "token": ["Invalid token for given user."] })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn read_form(state: &BackendState, mut multipart: Multipart) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap();
        let value = match file_name {
            Some(file_name) => format!("{file_name}:{}", data.len()),
            None => String::from_utf8_lossy(&data).into_owned(),
        };
        fields.push((name, value));
    }
    *state.last_form.lock() = fields.clone();
    fields
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

async fn create_pipeline(State(state): Shared, headers: HeaderMap, multipart: Multipart) -> Response {
    state.upload_attempts.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = read_form(&state, multipart).await;
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "p-2",
            "name": field(&fields, "name"),
            "status": field(&fields, "status").unwrap_or("active"),
        })),
    )
        .into_response()
}

async fn create_image(State(state): Shared, headers: HeaderMap, multipart: Multipart) -> Response {
    state.upload_attempts.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = read_form(&state, multipart).await;
    (StatusCode::CREATED, Json(image_json("img-2", &fields))).into_response()
}

async fn update_image(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    state.upload_attempts.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = read_form(&state, multipart).await;
    Json(image_json(&id, &fields)).into_response()
}

fn image_json(id: &str, fields: &[(String, String)]) -> Value {
    json!({
        "id": id,
        "name": field(fields, "name"),
        "pipeline": field(fields, "pipeline"),
        "image_type": field(fields, "image_type"),
        "is_cog_converted": false,
    })
}
