//! Client-side authentication session.
//!
//! `AuthSession` is the single owner of the signed-in user, the freelancer profile
//! and the bearer token. It is constructed once per process (after the storage
//! `sanitize` pass) and is the only place that mutates auth state. Readers either
//! take a `snapshot()` or `subscribe()` to changes.
//!
//! States: `Unauthenticated` -> `Loading` (boot validation) -> `Authenticated`.
//! Every profile write is followed by a full re-fetch; nothing patches the cached
//! freelancer profile locally, so what is shown is always the last server answer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::models::{Education, FreelancerPatch, FreelancerProfile, ProfileEnvelope, User, UserPatch, WorkExperience};
use super::role::Role;
use crate::error::{AppError, AppResult};
use crate::gamification::MAX_XP_AWARD;
use crate::gateway::{ApiClient, RequestOptions};
use crate::storage::{keys, SessionStore};

pub const PROFILE_PATH: &str = "/api/users/me";
pub const EDUCATION_PATH: &str = "/api/profile/education";
pub const EXPERIENCE_PATH: &str = "/api/profile/experience";
pub const SKILLS_PATH: &str = "/api/profile/skills";
pub const XP_PATH: &str = "/api/gamification/xp";

pub const HEADER_USER_ID: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    Loading,
    Authenticated,
}

/// Read-only view handed to subscribers.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub user: Option<User>,
    pub freelancer: Option<FreelancerProfile>,
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool { self.status == AuthStatus::Authenticated }
    pub fn is_loading(&self) -> bool { self.status == AuthStatus::Loading }

    /// Role used for gating; guest when signed out or when the user has none.
    pub fn role(&self) -> Role {
        if !self.is_authenticated() {
            return Role::Guest;
        }
        Role::effective(self.user.as_ref().and_then(|u| u.role))
    }
}

struct AuthState {
    status: AuthStatus,
    user: Option<User>,
    freelancer: Option<FreelancerProfile>,
    /// In-memory token; preferred over the durable copy.
    token: Option<String>,
}

impl AuthState {
    fn signed_out() -> Self { Self { status: AuthStatus::Unauthenticated, user: None, freelancer: None, token: None } }

    fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot { status: self.status, user: self.user.clone(), freelancer: self.freelancer.clone() }
    }
}

enum ProfileFetch {
    Loaded(ProfileEnvelope),
    Rejected(u16),
}

pub struct AuthSession {
    store: SessionStore,
    api: ApiClient,
    state: RwLock<AuthState>,
    /// Bumped by every refresh, login and logout; a refresh applies its result only
    /// if no later generation started meanwhile.
    generation: AtomicU64,
    tx: watch::Sender<AuthSnapshot>,
}

impl AuthSession {
    /// Session in the `Unauthenticated` state. Call `restore()` to hydrate from storage.
    pub fn new(store: SessionStore, api: ApiClient) -> Self {
        let state = AuthState::signed_out();
        let (tx, _) = watch::channel(state.snapshot());
        Self { store, api, state: RwLock::new(state), generation: AtomicU64::new(0), tx }
    }

    /// Construct and hydrate in one step.
    pub async fn boot(store: SessionStore, api: ApiClient) -> Self {
        let session = Self::new(store, api);
        session.restore().await;
        session
    }

    pub fn store(&self) -> &SessionStore { &self.store }
    pub fn api(&self) -> &ApiClient { &self.api }

    pub fn snapshot(&self) -> AuthSnapshot { self.state.read().snapshot() }
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> { self.tx.subscribe() }
    pub fn status(&self) -> AuthStatus { self.state.read().status }
    pub fn is_authenticated(&self) -> bool { self.status() == AuthStatus::Authenticated }
    pub fn user(&self) -> Option<User> { self.state.read().user.clone() }
    pub fn freelancer(&self) -> Option<FreelancerProfile> { self.state.read().freelancer.clone() }
    pub fn role(&self) -> Role { self.snapshot().role() }

    fn publish(&self) {
        let snap = self.state.read().snapshot();
        self.tx.send_replace(snap);
    }

    fn bump_generation(&self) -> u64 { self.generation.fetch_add(1, Ordering::SeqCst) + 1 }

    /// Bearer token: in-memory first, then durable storage.
    fn token(&self) -> Option<String> {
        self.state.read().token.clone().or_else(|| self.store.durable().read(keys::ACCESS_TOKEN))
    }

    /// Headers every authenticated call carries.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(token) = self.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if let Some(user_id) = self.store.durable().read(keys::USER_ID) {
            headers.push((HEADER_USER_ID.to_string(), user_id));
        }
        headers
    }

    async fn fetch_profile(&self, user_id: &str, token: Option<&str>) -> AppResult<ProfileFetch> {
        let opts = RequestOptions::get()
            .header(HEADER_USER_ID, user_id)
            .header("Authorization", format!("Bearer {}", token.unwrap_or("")));
        let resp = self.api.request(PROFILE_PATH, opts).await?;
        if !resp.is_success() {
            return Ok(ProfileFetch::Rejected(resp.status()));
        }
        let env = serde_json::from_slice::<ProfileEnvelope>(resp.body())?;
        Ok(ProfileFetch::Loaded(env))
    }

    /// Boot-time hydration. Without a durable user id nothing is requested. A rejected
    /// profile fetch wipes the durable identity; a transport failure leaves storage
    /// alone and simply stays signed out.
    pub async fn restore(&self) {
        let Some(user_id) = self.store.durable().read(keys::USER_ID) else {
            debug!(target: "auth", "no stored user; staying signed out");
            *self.state.write() = AuthState::signed_out();
            self.publish();
            return;
        };
        let token = self.store.durable().read(keys::ACCESS_TOKEN);
        let gen = self.bump_generation();
        {
            let mut st = self.state.write();
            st.status = AuthStatus::Loading;
            st.token = token.clone();
        }
        self.publish();

        let fetched = self.fetch_profile(&user_id, token.as_deref()).await;
        if self.generation.load(Ordering::SeqCst) != gen {
            debug!(target: "auth", "session changed during restore; result dropped");
            return;
        }
        match fetched {
            Ok(ProfileFetch::Loaded(env)) => {
                let mut st = self.state.write();
                st.status = AuthStatus::Authenticated;
                st.user = Some(env.user);
                st.freelancer = env.freelancer;
                drop(st);
                info!(target: "auth", user_id = %user_id, "session restored");
            }
            Ok(ProfileFetch::Rejected(status)) => {
                info!(target: "auth", status, "stored session rejected; clearing identity");
                if let Err(e) = self.store.durable().remove_all(&keys::DURABLE_AUTH) {
                    warn!(target: "auth", error = %e, "failed to clear stored identity");
                }
                *self.state.write() = AuthState::signed_out();
            }
            Err(e) => {
                warn!(target: "auth", error = %e, "session restore failed");
                *self.state.write() = AuthState::signed_out();
            }
        }
        self.publish();
    }

    /// Adopt an already-validated identity. Persists id, role and token before returning,
    /// so a following `refresh_profile()` sees them.
    pub fn login(&self, user: User, token: Option<String>) -> AppResult<()> {
        let durable = self.store.durable();
        durable.write(keys::USER_ID, &user.id)?;
        if let Some(role) = user.role {
            durable.write(keys::USER_ROLE, role.as_str())?;
        }
        if let Some(t) = &token {
            durable.write(keys::ACCESS_TOKEN, t)?;
        }
        self.bump_generation();
        {
            let mut st = self.state.write();
            let same_user = st.user.as_ref().map(|u| u.id == user.id).unwrap_or(false);
            if !same_user {
                st.freelancer = None;
            }
            info!(target: "auth", user_id = %user.id, role = ?user.role, "signed in");
            st.user = Some(user);
            st.token = token;
            st.status = AuthStatus::Authenticated;
        }
        self.publish();
        Ok(())
    }

    /// Drop every stored key and the in-memory session. Memory is reset even when
    /// storage fails; the storage error is returned afterwards.
    pub fn logout(&self) -> AppResult<()> {
        let cleared = self.store.clear_auth();
        self.bump_generation();
        *self.state.write() = AuthState::signed_out();
        self.publish();
        info!(target: "auth", "signed out");
        cleared
    }

    /// Re-fetch user and freelancer profile. Best effort: failures are logged and the
    /// previous state is kept. Overlapping calls all hit the API; only the most recent
    /// one may apply its answer.
    pub async fn refresh_profile(&self) {
        if !self.is_authenticated() {
            return;
        }
        let gen = self.bump_generation();
        let user_id = self.store.durable().read(keys::USER_ID).unwrap_or_default();
        let token = self.token();
        match self.fetch_profile(&user_id, token.as_deref()).await {
            Ok(ProfileFetch::Loaded(env)) => {
                if self.generation.load(Ordering::SeqCst) != gen {
                    debug!(target: "auth", gen, "stale refresh dropped");
                    return;
                }
                {
                    let mut st = self.state.write();
                    if st.status != AuthStatus::Authenticated {
                        return;
                    }
                    st.user = Some(env.user);
                    st.freelancer = env.freelancer;
                }
                self.publish();
                debug!(target: "auth", gen, "profile refreshed");
            }
            Ok(ProfileFetch::Rejected(status)) => {
                warn!(target: "auth", status, "profile refresh rejected; keeping cached profile");
            }
            Err(e) => {
                warn!(target: "auth", error = %e, "profile refresh failed; keeping cached profile");
            }
        }
    }

    /// `PUT` the patch and merge the returned user into memory. No-op when signed out.
    pub async fn update_user(&self, patch: &UserPatch) -> AppResult<()> {
        if !self.is_authenticated() {
            return Ok(());
        }
        let opts = RequestOptions::put().headers(self.auth_headers()).json(patch)?;
        let resp = self.api.request(PROFILE_PATH, opts).await?;
        if !resp.is_success() {
            return Err(AppError::api(resp.status(), "update_user_failed", "Failed to update user"));
        }
        if let Some(server_user) = resp.json_safe::<Value>().and_then(|v| v.get("user").cloned()) {
            let mut st = self.state.write();
            if let Some(current) = st.user.as_ref() {
                st.user = Some(current.merged_with(&server_user)?);
            }
        }
        self.publish();
        Ok(())
    }

    /// `PUT` the patch, then re-fetch: the write endpoint does not echo the freelancer profile.
    pub async fn update_freelancer(&self, patch: &FreelancerPatch) -> AppResult<()> {
        if !self.is_authenticated() {
            return Ok(());
        }
        let opts = RequestOptions::put().json(patch)?;
        self.write_then_refresh(PROFILE_PATH, opts, "update_freelancer_failed", "Failed to update freelancer profile").await
    }

    pub async fn add_education(&self, education: &Education) -> AppResult<()> {
        let body = Education { id: None, ..education.clone() };
        let opts = RequestOptions::post().json(&body)?;
        self.write_then_refresh(EDUCATION_PATH, opts, "add_education_failed", "Failed to add education").await
    }

    pub async fn delete_education(&self, id: &str) -> AppResult<()> {
        let path = format!("{}/{}", EDUCATION_PATH, urlencoding::encode(id));
        self.write_then_refresh(&path, RequestOptions::delete(), "delete_education_failed", "Failed to delete education").await
    }

    pub async fn add_experience(&self, experience: &WorkExperience) -> AppResult<()> {
        let body = WorkExperience { id: None, ..experience.clone() };
        let opts = RequestOptions::post().json(&body)?;
        self.write_then_refresh(EXPERIENCE_PATH, opts, "add_experience_failed", "Failed to add experience").await
    }

    pub async fn delete_experience(&self, id: &str) -> AppResult<()> {
        let path = format!("{}/{}", EXPERIENCE_PATH, urlencoding::encode(id));
        self.write_then_refresh(&path, RequestOptions::delete(), "delete_experience_failed", "Failed to delete experience").await
    }

    pub async fn add_skill(&self, skill: &str) -> AppResult<()> {
        let opts = RequestOptions::post().json(&serde_json::json!({ "skill": skill }))?;
        self.write_then_refresh(SKILLS_PATH, opts, "add_skill_failed", "Failed to add skill").await
    }

    pub async fn remove_skill(&self, skill: &str) -> AppResult<()> {
        let opts = RequestOptions::delete().json(&serde_json::json!({ "skill": skill }))?;
        self.write_then_refresh(SKILLS_PATH, opts, "remove_skill_failed", "Failed to remove skill").await
    }

    /// Award XP for a completed test. The server recomputes level and
    /// professionalism, so the new standing arrives with the refresh.
    pub async fn add_xp(&self, amount: u32) -> AppResult<()> {
        if !(1..=MAX_XP_AWARD).contains(&amount) {
            let mut fields = BTreeMap::new();
            fields.insert("amount".to_string(), format!("amount must be between 1 and {}", MAX_XP_AWARD));
            return Err(AppError::validation(fields));
        }
        if !self.is_authenticated() {
            return Err(AppError::session("login_required", "user not authenticated"));
        }
        let opts = RequestOptions::post().headers(self.auth_headers()).json(&serde_json::json!({ "amount": amount }))?;
        let resp = self.api.request(XP_PATH, opts).await?;
        if !resp.is_success() {
            warn!(target: "auth", status = resp.status(), amount, "xp award rejected");
            return Err(AppError::api(resp.status(), "add_xp_failed".to_string(), resp.error_message("Failed to add XP")));
        }
        info!(target: "auth", amount, "xp awarded");
        self.refresh_profile().await;
        Ok(())
    }

    async fn write_then_refresh(&self, path: &str, opts: RequestOptions, code: &str, failure: &str) -> AppResult<()> {
        let resp = self.api.request(path, opts.headers(self.auth_headers())).await?;
        if !resp.is_success() {
            warn!(target: "auth", path, status = resp.status(), "{}", failure);
            return Err(AppError::api(resp.status(), code, failure));
        }
        self.refresh_profile().await;
        Ok(())
    }
}
