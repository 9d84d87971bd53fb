use std::env;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Raster payloads are large; they get their own, longer budget.
    pub raster_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            raster_timeout: Duration::from_secs(120),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads `PIPEWATCH_API_URL`, `PIPEWATCH_REQUEST_TIMEOUT_SECS` and
    /// `PIPEWATCH_RASTER_TIMEOUT_SECS`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("PIPEWATCH_API_URL").unwrap_or(defaults.base_url),
            request_timeout: Duration::from_secs(env_var_u64(
                "PIPEWATCH_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            raster_timeout: Duration::from_secs(env_var_u64(
                "PIPEWATCH_RASTER_TIMEOUT_SECS",
                defaults.raster_timeout.as_secs(),
            )),
        }
    }

    pub fn with_timeouts(mut self, request: Duration, raster: Duration) -> Self {
        self.request_timeout = request;
        self.raster_timeout = raster;
        self
    }

    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

pub fn env_var_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default(key: &str, raw: &str, default: u64) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(v) => v,
        Err(err) => {
            warn!("ignoring {key}={raw:?}: {err}");
            default
        }
    }
}
