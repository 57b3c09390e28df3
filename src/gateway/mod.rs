//!
//! freelancekz API gateway client
//! ------------------------------
//! Wraps outbound HTTP calls with a default timeout, optional caller-owned
//! cancellation, base-URL resolution and forgiving response decoding.

use serde::de::DeserializeOwned;

mod abort;
mod client;
mod decode;

pub use abort::{AbortController, AbortSignal};
pub use client::{ApiClient, RequestOptions, DEFAULT_TIMEOUT};
pub use decode::{read_error_message, read_json_safe};

use crate::error::AppResult;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) async fn read(resp: reqwest::Response) -> AppResult<Self> {
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(Self { status, body })
    }

    pub fn from_parts(status: u16, body: Vec<u8>) -> Self { Self { status, body } }

    pub fn status(&self) -> u16 { self.status }
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

    pub fn json_safe<T: DeserializeOwned>(&self) -> Option<T> { read_json_safe(self) }

    pub fn error_message(&self, fallback: &str) -> String { read_error_message(self, fallback) }
}
