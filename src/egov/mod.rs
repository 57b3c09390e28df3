//!
//! freelancekz eGov.kz identity verification
//! -----------------------------------------
//! Redirect-based OAuth handshake with the national identity provider.
//! `provider` is the backend-side client (token exchange, userinfo); `flow` is the
//! client-side state machine resumed on the callback route; `record` holds the
//! volatile keys that carry state across the full-page redirect.

mod flow;
mod provider;
mod record;

pub use flow::{
    CallbackParams, FlowIntent, FlowStage, Redirect, VerificationFlow, VerificationOutcome, EGOV_CALLBACK_PATH,
    EGOV_REGISTER_PATH, EGOV_VERIFY_PATH, PROFILE_ROUTE, SUCCESS_REDIRECT_DELAY,
};
pub use provider::{EgovAuthService, TokenSet};
pub use record::{EgovIdentity, VerificationRecord};

pub const DEFAULT_EGOV_BASE_URL: &str = "https://idp.egov.kz";
pub const DEFAULT_EGOV_CLIENT_ID: &str = "freelancekz-app";
pub const DEFAULT_EGOV_REDIRECT_URI: &str = "http://localhost:8080/auth/egov/callback";
pub const DEFAULT_EGOV_SCOPE: &str = "openid email profile phone";

/// Provider registration. The secret is only ever set on the backend side.
#[derive(Debug, Clone)]
pub struct EgovConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for EgovConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EGOV_BASE_URL.to_string(),
            client_id: DEFAULT_EGOV_CLIENT_ID.to_string(),
            client_secret: None,
            redirect_uri: DEFAULT_EGOV_REDIRECT_URI.to_string(),
            scope: DEFAULT_EGOV_SCOPE.to_string(),
        }
    }
}

impl EgovConfig {
    /// Copy without the client secret, for handing to client-side code.
    pub fn public(&self) -> Self { Self { client_secret: None, ..self.clone() } }
}
