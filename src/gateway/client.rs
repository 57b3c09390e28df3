use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use super::abort::AbortSignal;
use super::ApiResponse;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Timeout applied when the caller does not bring its own abort signal.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Per-request options. Headers are kept as plain pairs and validated by reqwest at send time.
#[derive(Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub signal: Option<AbortSignal>,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: Method::GET, headers: Vec::new(), body: None, signal: None, timeout: None }
    }
}

impl RequestOptions {
    pub fn get() -> Self { Self::default() }
    pub fn post() -> Self { Self { method: Method::POST, ..Self::default() } }
    pub fn put() -> Self { Self { method: Method::PUT, ..Self::default() } }
    pub fn delete() -> Self { Self { method: Method::DELETE, ..Self::default() } }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.headers.extend(pairs);
        self
    }

    /// Serialize `body` as JSON and set the content type unless a header already did.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> AppResult<Self> {
        self.body = Some(serde_json::to_string(body)?);
        if !self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            self.headers.push(("Content-Type".into(), "application/json".into()));
        }
        Ok(self)
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outbound HTTP wrapper for the marketplace API.
///
/// Non-2xx responses are returned, not raised: callers inspect `status()` themselves.
/// Only transport failures and cancellations surface as errors.
#[derive(Clone)]
pub struct ApiClient {
    base: Option<String>,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ApiClient {
    pub fn new(base: Option<&str>) -> AppResult<Self> {
        let client = reqwest::Client::builder().build()?;
        let base = base.map(|b| b.trim_end_matches('/').to_string()).filter(|b| !b.is_empty());
        Ok(Self { base, client, default_timeout: DEFAULT_TIMEOUT })
    }

    pub fn from_config(cfg: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(cfg.api_base_url.as_deref())?.with_default_timeout(cfg.request_timeout))
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn base(&self) -> Option<&str> { self.base.as_deref() }

    /// Resolve `path` against the configured base. Absolute URLs and a missing base
    /// leave the path untouched.
    pub fn url(&self, path: &str) -> String {
        let Some(base) = &self.base else { return path.to_string() };
        if is_absolute(path) {
            return path.to_string();
        }
        if path.starts_with('/') { format!("{}{}", base, path) } else { format!("{}/{}", base, path) }
    }

    /// A relative path needs a configured base; without one the call fails with
    /// `no_base_url` before anything is sent.
    pub async fn request(&self, path: &str, opts: RequestOptions) -> AppResult<ApiResponse> {
        if self.base.is_none() && !is_absolute(path) {
            return Err(AppError::transport(
                "no_base_url".to_string(),
                format!("no API base URL configured; cannot request relative path {}", path),
            ));
        }
        let url = self.url(path);
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut rb = self.client.request(opts.method.clone(), &url).header("X-Request-Id", &request_id);
        for (k, v) in &opts.headers {
            rb = rb.header(k.as_str(), v.as_str());
        }
        if let Some(body) = opts.body {
            rb = rb.body(body);
        }
        debug!(target: "gateway", method = %opts.method, url = %url, request_id = %request_id, "request");

        let exchange = async {
            let resp = rb.send().await?;
            ApiResponse::read(resp).await
        };

        let result = match opts.signal {
            // the caller owns the timeout policy
            Some(signal) => tokio::select! {
                r = exchange => r,
                _ = signal.aborted() => Err(AppError::cancelled("aborted".to_string(), format!("request to {} was aborted", path))),
            },
            None => {
                let limit = opts.timeout.unwrap_or(self.default_timeout);
                match tokio::time::timeout(limit, exchange).await {
                    Ok(r) => r,
                    Err(_) => Err(AppError::cancelled(
                        "timeout".to_string(),
                        format!("request to {} timed out after {} ms", path, limit.as_millis()),
                    )),
                }
            }
        };

        match &result {
            Ok(resp) => debug!(target: "gateway", request_id = %request_id, status = resp.status(), "response"),
            Err(e) => debug!(target: "gateway", request_id = %request_id, error = %e, "request failed"),
        }
        result
    }
}

fn is_absolute(path: &str) -> bool { path.starts_with("http://") || path.starts_with("https://") }
