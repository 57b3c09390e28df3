//! Credential flows that end in `AuthSession::login`.
//!
//! Both validate locally first, then talk to the API, then adopt the session.
//! The session itself never calls these; they are the caller-side half of the
//! "validate then adopt" contract of `login()`.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::models::{ProfileEnvelope, User};
use super::role::Role;
use super::session::{AuthSession, HEADER_USER_ID, PROFILE_PATH};
use super::validation::{SignInForm, SignUpForm};
use crate::error::{AppError, AppResult};
use crate::gateway::RequestOptions;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";

/// `{ user_id, role? }` answer of the login and registration endpoints.
#[derive(Debug, Deserialize)]
struct IssuedIdentity {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

/// Email/password sign-in. Returns the adopted user.
pub async fn sign_in(session: &AuthSession, form: &SignInForm) -> AppResult<User> {
    form.validate()?;
    let email = form.email.trim();
    let opts = RequestOptions::post().json(&json!({ "email": email, "password": form.password }))?;
    let resp = session.api().request(LOGIN_PATH, opts).await?;
    if !resp.is_success() {
        return Err(AppError::api(resp.status(), "login_failed".to_string(), resp.error_message("Login failed")));
    }
    let issued = resp.json_safe::<IssuedIdentity>();
    let Some(IssuedIdentity { user_id: Some(user_id), role }) = issued else {
        return Err(AppError::api(resp.status(), "invalid_response", "Login failed: invalid response"));
    };

    // The profile read is best effort; the login answer alone is enough to adopt.
    let profile = session
        .api()
        .request(PROFILE_PATH, RequestOptions::get().header(HEADER_USER_ID, user_id.as_str()))
        .await
        .ok()
        .filter(|r| r.is_success())
        .and_then(|r| r.json_safe::<ProfileEnvelope>());

    let user = match profile {
        Some(env) => env.user,
        None => {
            debug!(target: "auth", "profile unavailable after login; using login answer");
            User { email: Some(email.to_string()), role, ..User::new(user_id) }
        }
    };
    session.login(user.clone(), None)?;
    info!(target: "auth", user_id = %user.id, "sign-in complete");
    Ok(user)
}

/// Account creation. New accounts start unverified at the first level.
pub async fn register(session: &AuthSession, form: &SignUpForm) -> AppResult<User> {
    form.validate()?;
    let role = form.role.unwrap_or_default();
    let mut body = json!({
        "email": form.email.trim(),
        "password": form.password,
        "role": role.as_str(),
        "fullName": form.full_name.trim(),
    });
    if let Some(iin) = form.iin_value() {
        body["iin"] = json!(iin);
    }
    let resp = session.api().request(REGISTER_PATH, RequestOptions::post().json(&body)?).await?;
    if !resp.is_success() {
        return Err(AppError::api(
            resp.status(),
            "registration_failed".to_string(),
            resp.error_message("Registration failed"),
        ));
    }
    let Some(IssuedIdentity { user_id: Some(user_id), role: issued_role }) = resp.json_safe::<IssuedIdentity>() else {
        return Err(AppError::api(resp.status(), "invalid_response", "Registration failed: invalid response"));
    };

    let user = User {
        email: Some(form.email.trim().to_string()),
        full_name: Some(form.full_name.trim().to_string()),
        role: Some(issued_role.unwrap_or(role)),
        egov_auth: false,
        xp: Some(0),
        level: Some("novice".to_string()),
        professionalism: Some(0),
        ..User::new(user_id)
    };
    session.login(user.clone(), None)?;
    info!(target: "auth", user_id = %user.id, role = %role, "registration complete");
    Ok(user)
}
