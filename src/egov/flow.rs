//! Client-side verification handshake.
//!
//! The provider round trip is a full-page redirect, so nothing lives in memory
//! between `begin` and `handle_callback`: the intent marker is written to the
//! volatile scope before leaving and read back when the callback route runs.
//!
//! Stages: Idle -> Redirected (marker written) -> PendingCallback (code received)
//! -> Verified | Failed. Every failure is terminal; nothing is retried, and the
//! one-time code is kept only for display.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::provider::{truncate_code, EgovAuthService};
use super::record::{EgovIdentity, VerificationRecord};
use crate::error::{AppError, AppResult};
use crate::gateway::RequestOptions;
use crate::identity::{AuthSession, Role, User, HEADER_USER_ID};
use crate::storage::keys;

pub const EGOV_CALLBACK_PATH: &str = "/api/auth/egov/callback";
pub const EGOV_VERIFY_PATH: &str = "/api/auth/egov/verify";
pub const EGOV_REGISTER_PATH: &str = "/api/auth/egov/register";
pub const PROFILE_ROUTE: &str = "/profile";
pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_millis(2000);

pub const MSG_EXCHANGE_FAILED: &str = "eGov authentication failed";
pub const MSG_VERIFY_FAILED: &str = "Verification failed";
pub const MSG_SIGN_IN_FAILED: &str = "eGov sign-in failed";
pub const MSG_MISSING_CODE: &str = "No authorization code received from eGov.kz";
pub const MSG_LOGIN_FIRST: &str = "Please sign up or log in before verifying with eGov.kz";

/// Why the handshake was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowIntent {
    /// Sign in (or sign up) with the provider's identity.
    Login,
    /// Attach the provider's identity to the already signed-in user.
    Verify,
}

impl FlowIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowIntent::Login => "login",
            FlowIntent::Verify => "verify",
        }
    }
}

impl fmt::Display for FlowIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for FlowIntent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(FlowIntent::Login),
            "verify" => Ok(FlowIntent::Verify),
            other => Err(AppError::internal("unknown_intent".to_string(), format!("unknown eGov flow intent '{}'", other))),
        }
    }
}

/// Where the handshake stands, as far as storage can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Idle,
    Redirected(FlowIntent),
}

/// Query parameters of the callback route. Empty values count as absent, which
/// is how the gateway relay forwards parameters the provider did not send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse `code=..&state=..&error=..`; a leading `?` is accepted.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.trim_start_matches('?').split('&') {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let v = urlencoding::decode(&v.replace('+', " ")).map(|c| c.into_owned()).unwrap_or_else(|_| v.to_string());
            let v = Some(v).filter(|v| !v.is_empty());
            match k {
                "code" => params.code = v,
                "state" => params.state = v,
                "error" => params.error = v,
                _ => {}
            }
        }
        params
    }

    pub fn with_code(code: impl Into<String>) -> Self { Self { code: Some(code.into()), ..Self::default() } }
}

/// Navigation scheduled after success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: &'static str,
    pub delay: Duration,
}

impl Redirect {
    /// Sleep out the delay; the caller navigates afterwards.
    pub async fn wait(&self) { tokio::time::sleep(self.delay).await }
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified { identity: EgovIdentity, intent: FlowIntent, redirect: Redirect },
    Failed { message: String },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool { matches!(self, VerificationOutcome::Verified { .. }) }

    pub fn failure(&self) -> Option<&str> {
        match self {
            VerificationOutcome::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeAnswer {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    user: Option<EgovIdentity>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RoleAnswer {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

pub struct VerificationFlow<'a> {
    session: &'a AuthSession,
    provider: &'a EgovAuthService,
}

impl<'a> VerificationFlow<'a> {
    pub fn new(session: &'a AuthSession, provider: &'a EgovAuthService) -> Self { Self { session, provider } }

    pub fn stage(&self) -> FlowStage {
        match self.session.store().volatile().read(keys::EGOV_FLOW).and_then(|m| m.parse().ok()) {
            Some(intent) => FlowStage::Redirected(intent),
            None => FlowStage::Idle,
        }
    }

    /// Write the intent marker and return the provider URL to navigate to.
    pub fn begin(&self, intent: FlowIntent) -> AppResult<String> {
        self.session.store().volatile().write(keys::EGOV_FLOW, intent.as_str())?;
        info!(target: "egov", intent = %intent, "redirecting to identity provider");
        Ok(self.provider.authorization_url(Some(intent.as_str())))
    }

    /// Resume the handshake on the callback route. Never errors: every failure is
    /// folded into `VerificationOutcome::Failed`, and the intent marker is cleared
    /// either way.
    pub async fn handle_callback(&self, params: &CallbackParams) -> VerificationOutcome {
        match self.complete(params).await {
            Ok((identity, intent)) => {
                info!(target: "egov", intent = %intent, "identity verification complete");
                VerificationOutcome::Verified {
                    identity,
                    intent,
                    redirect: Redirect { to: PROFILE_ROUTE, delay: SUCCESS_REDIRECT_DELAY },
                }
            }
            Err(e) => {
                warn!(target: "egov", error = %e, "identity verification failed");
                if let Err(clear) = self.session.store().volatile().remove(keys::EGOV_FLOW) {
                    warn!(target: "egov", error = %clear, "failed to clear flow marker");
                }
                VerificationOutcome::Failed { message: e.user_message().to_string() }
            }
        }
    }

    async fn complete(&self, params: &CallbackParams) -> AppResult<(EgovIdentity, FlowIntent)> {
        if let Some(err) = &params.error {
            return Err(AppError::provider("provider_error".to_string(), format!("eGov authentication error: {}", err)));
        }
        let Some(code) = params.code.as_deref() else {
            return Err(AppError::provider("missing_code", MSG_MISSING_CODE));
        };
        info!(target: "egov", code = %truncate_code(code), state = ?params.state, "callback received");

        let (identity, access_token) = self.exchange(code, params.state.as_deref()).await?;
        let store = self.session.store();
        VerificationRecord::save(store, &identity, code)?;
        if let Some(token) = &access_token {
            store.volatile().write(keys::EGOV_ACCESS_TOKEN, token)?;
        }

        let intent = self.resolve_intent(params);
        let attrs = json!({
            "email": identity.email,
            "iin": identity.iin,
            "phone": identity.phone,
            "fullName": identity.full_name,
        });

        let (user_id, role, token) = match intent {
            FlowIntent::Verify => {
                let Some(user_id) = store.durable().read(keys::USER_ID) else {
                    return Err(AppError::session("login_required", MSG_LOGIN_FIRST));
                };
                let opts = RequestOptions::post().header(HEADER_USER_ID, user_id.as_str()).json(&attrs)?;
                let resp = self.session.api().request(EGOV_VERIFY_PATH, opts).await?;
                if !resp.is_success() {
                    return Err(AppError::api(resp.status(), "verify_failed".to_string(), resp.error_message(MSG_VERIFY_FAILED)));
                }
                let role = resp.json_safe::<RoleAnswer>().unwrap_or_default().role;
                // the app token stays as it is; the provider token is not an API credential
                (user_id, role, None)
            }
            FlowIntent::Login => {
                let resp = self.session.api().request(EGOV_REGISTER_PATH, RequestOptions::post().json(&attrs)?).await?;
                if !resp.is_success() {
                    return Err(AppError::api(resp.status(), "egov_sign_in_failed".to_string(), resp.error_message(MSG_SIGN_IN_FAILED)));
                }
                let Some(RoleAnswer { user_id: Some(user_id), role }) = resp.json_safe::<RoleAnswer>() else {
                    return Err(AppError::api(resp.status(), "invalid_response", "eGov sign-in failed: invalid response"));
                };
                (user_id, role, access_token)
            }
        };

        let user = User {
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            phone: identity.phone.clone(),
            iin: identity.iin.clone(),
            role,
            egov_auth: true,
            ..User::new(user_id)
        };
        self.session.login(user, token)?;
        store.durable().write(keys::IS_EGOV_AUTH, "true")?;
        store.volatile().remove(keys::EGOV_FLOW)?;
        self.session.refresh_profile().await;
        Ok((identity, intent))
    }

    /// Backend code exchange. The client never talks to the provider's token endpoint.
    async fn exchange(&self, code: &str, state: Option<&str>) -> AppResult<(EgovIdentity, Option<String>)> {
        let mut path = format!("{}?code={}", EGOV_CALLBACK_PATH, urlencoding::encode(code));
        if let Some(s) = state {
            path.push_str(&format!("&state={}", urlencoding::encode(s)));
        }
        let resp = self.session.api().request(&path, RequestOptions::get()).await?;
        if !resp.is_success() {
            let message = resp
                .json_safe::<ExchangeAnswer>()
                .and_then(|a| a.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| MSG_EXCHANGE_FAILED.to_string());
            return Err(AppError::api(resp.status(), "exchange_failed".to_string(), message));
        }
        match resp.json_safe::<ExchangeAnswer>() {
            Some(ExchangeAnswer { success: true, user: Some(identity), access_token, .. }) => Ok((identity, access_token)),
            Some(ExchangeAnswer { error: Some(e), .. }) if !e.is_empty() => Err(AppError::api(resp.status(), "exchange_failed".to_string(), e)),
            _ => Err(AppError::api(resp.status(), "exchange_failed", MSG_EXCHANGE_FAILED)),
        }
    }

    /// `state` wins, then the stored marker, then verify.
    fn resolve_intent(&self, params: &CallbackParams) -> FlowIntent {
        params
            .state
            .as_deref()
            .and_then(|s| s.parse().ok())
            .or_else(|| self.session.store().volatile().read(keys::EGOV_FLOW).and_then(|m| m.parse().ok()))
            .unwrap_or(FlowIntent::Verify)
    }
}
