//! Client for the identity provider's OAuth endpoints.
//!
//! `authorization_url` is safe anywhere. `exchange_code_for_token` and `user_info`
//! belong on the backend: the exchange needs the client secret.

use serde::Deserialize;
use tracing::{debug, warn};

use super::record::EgovIdentity;
use super::EgovConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::DEFAULT_TIMEOUT;

/// Token endpoint answer.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UserInfoClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    iin: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<UserInfoClaims> for EgovIdentity {
    fn from(c: UserInfoClaims) -> Self {
        EgovIdentity { id: c.sub, email: c.email, phone: c.phone_number, iin: c.iin, full_name: c.name }
    }
}

#[derive(Clone)]
pub struct EgovAuthService {
    config: EgovConfig,
    client: reqwest::Client,
}

impl EgovAuthService {
    pub fn new(config: EgovConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EgovConfig { &self.config }

    fn endpoint(&self, path: &str) -> String { format!("{}{}", self.config.base_url.trim_end_matches('/'), path) }

    /// `{base}/oauth2/authorize?client_id&redirect_uri&response_type=code&scope[&state]`.
    /// An empty state is omitted.
    pub fn authorization_url(&self, state: Option<&str>) -> String {
        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", self.config.scope.as_str()),
        ];
        if let Some(s) = state.filter(|s| !s.is_empty()) {
            params.push(("state", s));
        }
        format!("{}?{}", self.endpoint("/oauth2/authorize"), encode_pairs(&params))
    }

    /// Authorization-code grant, form encoded. The code is single use: a second
    /// exchange fails at the provider and is reported, never retried.
    pub async fn exchange_code_for_token(&self, code: &str) -> AppResult<TokenSet> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        debug!(target: "egov", code = %truncate_code(code), "exchanging authorization code");
        let resp = self
            .client
            .post(self.endpoint("/oauth2/token"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(encode_pairs(&form))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(target: "egov", status = status.as_u16(), "token exchange rejected");
            return Err(AppError::provider("token_exchange_failed".to_string(), format!("Token exchange failed: {}", text)));
        }
        Ok(resp.json::<TokenSet>().await?)
    }

    pub async fn user_info(&self, access_token: &str) -> AppResult<EgovIdentity> {
        let resp = self.client.get(self.endpoint("/oauth2/userinfo")).bearer_auth(access_token).send().await?;
        if !resp.status().is_success() {
            warn!(target: "egov", status = resp.status().as_u16(), "userinfo rejected");
            return Err(AppError::provider("userinfo_failed", "Failed to get user info"));
        }
        let claims = resp.json::<UserInfoClaims>().await?;
        Ok(claims.into())
    }
}

fn encode_pairs(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// First ten characters, for log lines.
pub(crate) fn truncate_code(code: &str) -> String { code.chars().take(10).collect() }
