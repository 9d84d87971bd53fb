//! Backend double serving the image endpoints the overlay pipeline calls.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use credentials::{InMemoryTokenStore, TokenPair};
use parking_lot::Mutex;
use serde_json::{Value, json};
use session::{ApiClient, ApiConfig, SessionContext};

pub const REFRESH_TOKEN: &str = "refresh-1";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\noverlay";

pub struct BackendState {
    pub accepted_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub raster_hits: AtomicUsize,
    /// Bearer token on the last raster request, if any.
    pub raster_bearer: Mutex<Option<String>>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            accepted_access: Mutex::new("access-1".to_string()),
            refresh_calls: AtomicUsize::new(0),
            raster_hits: AtomicUsize::new(0),
            raster_bearer: Mutex::new(None),
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
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/api/auth/jwt/refresh/", post(jwt_refresh))
            .route("/api/satellite-images/:id/", get(satellite_image))
            .route("/api/satellite-images/:id/display_image/", get(display_image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn client_with(&self, store: InMemoryTokenStore) -> ApiClient {
        let config = ApiConfig::new(format!("http://{}/api", self.addr));
        ApiClient::new(config, SessionContext::new(store))
    }

    pub fn client_with_access(&self, access: &str) -> ApiClient {
        self.client_with(InMemoryTokenStore::with_pair(&TokenPair::new(
            access,
            REFRESH_TOKEN,
        )))
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
    bearer(headers).is_some_and(|token| token == *state.accepted_access.lock())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Authentication credentials were not provided." })),
    )
        .into_response()
}

async fn jwt_refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body["refresh"] != REFRESH_TOKEN {
        return unauthorized();
    }
    *state.accepted_access.lock() = "access-2".to_string();
    Json(json!({ "access": "access-2" })).into_response()
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

async fn display_image(State(state): Shared, headers: HeaderMap) -> Response {
    state.raster_hits.fetch_add(1, Ordering::SeqCst);
    *state.raster_bearer.lock() = bearer(&headers);
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}
