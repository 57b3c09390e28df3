//! Environment-driven configuration shared by the library and both binaries.
//! Binaries layer CLI flags on top of `AppConfig::from_env()`.

use std::path::PathBuf;
use std::time::Duration;

use crate::egov::EgovConfig;
use crate::gateway::DEFAULT_TIMEOUT;

pub const ENV_API_BASE_URL: &str = "FREELANCEKZ_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "FREELANCEKZ_TIMEOUT_MS";
pub const ENV_STATE_DIR: &str = "FREELANCEKZ_STATE_DIR";
pub const ENV_GATEWAY_PORT: &str = "FREELANCEKZ_GATEWAY_PORT";
pub const ENV_FRONTEND_URL: &str = "FRONTEND_URL";
pub const ENV_PING_MESSAGE: &str = "PING_MESSAGE";
pub const ENV_EGOV_BASE_URL: &str = "EGOV_BASE_URL";
pub const ENV_EGOV_CLIENT_ID: &str = "EGOV_CLIENT_ID";
pub const ENV_EGOV_CLIENT_SECRET: &str = "EGOV_CLIENT_SECRET";
pub const ENV_EGOV_REDIRECT_URI: &str = "EGOV_REDIRECT_URI";

pub const DEFAULT_STATE_DIR: &str = ".freelancekz";
pub const DEFAULT_GATEWAY_PORT: u16 = 8787;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API prefix without trailing slash; `None` leaves request paths untouched.
    pub api_base_url: Option<String>,
    pub request_timeout: Duration,
    /// Holds the durable session file.
    pub state_dir: PathBuf,
    pub egov: EgovConfig,
    pub frontend_url: String,
    pub gateway_port: u16,
    pub ping_message: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout: DEFAULT_TIMEOUT,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            egov: EgovConfig::default(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            gateway_port: DEFAULT_GATEWAY_PORT,
            ping_message: "ping".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Build from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let d = Self::default();
        let egov_default = EgovConfig::default();
        Self {
            api_base_url: get(ENV_API_BASE_URL)
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            request_timeout: get(ENV_TIMEOUT_MS)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(d.request_timeout),
            state_dir: get(ENV_STATE_DIR).map(PathBuf::from).unwrap_or(d.state_dir),
            egov: EgovConfig {
                base_url: get(ENV_EGOV_BASE_URL).unwrap_or(egov_default.base_url),
                client_id: get(ENV_EGOV_CLIENT_ID).unwrap_or(egov_default.client_id),
                client_secret: get(ENV_EGOV_CLIENT_SECRET),
                redirect_uri: get(ENV_EGOV_REDIRECT_URI).unwrap_or(egov_default.redirect_uri),
                scope: egov_default.scope,
            },
            frontend_url: get(ENV_FRONTEND_URL).unwrap_or(d.frontend_url),
            gateway_port: get(ENV_GATEWAY_PORT).and_then(|v| v.parse::<u16>().ok()).unwrap_or(d.gateway_port),
            ping_message: get(ENV_PING_MESSAGE).unwrap_or(d.ping_message),
        }
    }
}
