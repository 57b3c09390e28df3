//! Shared fixtures: an in-process mock of the marketplace API and of the
//! identity provider, both bound to `127.0.0.1:0`.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use freelancekz::gamification::{progress_for_xp, Level};
use freelancekz::gateway::ApiClient;
use freelancekz::identity::AuthSession;
use freelancekz::storage::SessionStore;

#[derive(Debug, Clone)]
pub struct Hit {
    pub method: &'static str,
    pub path: String,
    pub user_id: Option<String>,
    pub auth: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub users: HashMap<String, Value>,
    pub freelancers: HashMap<String, Value>,
    /// email -> (password, user id)
    pub credentials: HashMap<String, (String, String)>,
    pub hits: Vec<Hit>,
    pub profile_status: Option<u16>,
    /// Per-call delays for `GET /api/users/me`, consumed in arrival order.
    pub profile_delays: VecDeque<u64>,
    pub fail_writes: bool,
    pub login_delay_ms: u64,
    pub verify_status: Option<u16>,
    pub egov_identity: Value,
    pub egov_access_token: String,
    pub next_id: u64,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Arc<Mutex<MockState>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(String::from)
}

fn err(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) { (status, Json(json!({ "error": msg }))) }

impl MockBackend {
    pub fn new() -> Self {
        let mb = Self::default();
        {
            let mut st = mb.state.lock();
            st.egov_identity = json!({
                "id": "egov-sub-1",
                "email": "aru@egov.kz",
                "phone": "+77010000000",
                "iin": "990101300123",
                "fullName": "Aru Nurlanovna",
            });
            st.egov_access_token = "egov-token".to_string();
        }
        mb
    }

    /// Insert a user (and a freelancer profile for freelancer-side roles).
    pub fn seed_user(&self, id: &str, email: &str, password: &str, role: &str) {
        let mut st = self.state.lock();
        st.users.insert(
            id.to_string(),
            json!({ "_id": id, "email": email, "fullName": "Seeded User", "role": role, "egov_auth": false, "xp": 120 }),
        );
        if role == "freelancer" || role == "both" {
            st.freelancers.insert(
                id.to_string(),
                json!({ "user_id": id, "title": "", "skills": [], "education": [], "experience": [],
                        "level": "intermediate", "professionalism": 13 }),
            );
        }
        st.credentials.insert(email.to_string(), (password.to_string(), id.to_string()));
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.state.lock().hits.iter().filter(|h| h.method == method && h.path == path).count()
    }

    pub fn all_hits(&self) -> Vec<Hit> { self.state.lock().hits.clone() }

    pub fn last_hit(&self, method: &str, path: &str) -> Option<Hit> {
        self.state.lock().hits.iter().rev().find(|h| h.method == method && h.path == path).cloned()
    }

    pub fn set_title(&self, user_id: &str, title: &str) {
        if let Some(f) = self.state.lock().freelancers.get_mut(user_id) {
            f["title"] = json!(title);
        }
    }

    fn record(&self, method: &'static str, path: impl Into<String>, headers: &HeaderMap) {
        self.state.lock().hits.push(Hit {
            method,
            path: path.into(),
            user_id: header(headers, "x-user-id"),
            auth: header(headers, "authorization"),
        });
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut st = self.state.lock();
        st.next_id += 1;
        format!("{}-{}", prefix, st.next_id)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/api/users/me", get(get_me).put(put_me))
            .route("/api/profile/education", post(add_education))
            .route("/api/profile/education/{id}", delete(delete_education))
            .route("/api/profile/experience", post(add_experience))
            .route("/api/profile/experience/{id}", delete(delete_experience))
            .route("/api/profile/skills", post(add_skill).delete(remove_skill))
            .route("/api/gamification/xp", post(add_xp))
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/egov/callback", get(egov_callback))
            .route("/api/auth/egov/verify", post(egov_verify))
            .route("/api/auth/egov/register", post(egov_register))
            .route("/api/slow", get(slow))
            .with_state(self.clone())
    }

    /// Serve on an ephemeral port; returns the base URL.
    pub async fn spawn(&self) -> (String, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().unwrap();
        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                freelancekz::tprintln!("mock backend error: {e:?}");
            }
        });
        (format!("http://{}", addr), handle)
    }
}

/// Base URL on which nothing listens.
pub fn dead_base() -> String {
    let l = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = l.local_addr().unwrap().port();
    drop(l);
    format!("http://127.0.0.1:{}", port)
}

pub fn session_for(base: &str, store: SessionStore) -> AuthSession {
    AuthSession::new(store, ApiClient::new(Some(base)).unwrap())
}

// ---- marketplace API handlers ----

async fn get_me(State(mb): State<MockBackend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mb.record("GET", "/api/users/me", &headers);
    let uid = header(&headers, "x-user-id").unwrap_or_default();
    // answer is taken before the delay so a slow reply carries stale data
    let (status, delay, answer) = {
        let mut st = mb.state.lock();
        let answer = st.users.get(&uid).cloned().map(|u| json!({ "user": u, "freelancer": st.freelancers.get(&uid) }));
        (st.profile_status, st.profile_delays.pop_front(), answer)
    };
    if let Some(ms) = delay {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    if let Some(s) = status {
        return err(StatusCode::from_u16(s).unwrap(), "unauthorized");
    }
    match answer {
        Some(v) => (StatusCode::OK, Json(v)),
        None => err(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn put_me(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("PUT", "/api/users/me", &headers);
    let uid = header(&headers, "x-user-id").unwrap_or_default();
    let mut st = mb.state.lock();
    if st.fail_writes {
        return err(StatusCode::INTERNAL_SERVER_ERROR, "write failed");
    }
    let Some(mut user) = st.users.get(&uid).cloned() else {
        return err(StatusCode::NOT_FOUND, "user not found");
    };
    for k in ["fullName", "phone", "email"] {
        if let Some(v) = body.get(k) {
            user[k] = v.clone();
        }
    }
    st.users.insert(uid.clone(), user.clone());
    if let Some(f) = st.freelancers.get_mut(&uid) {
        for k in ["title", "bio", "location", "hourly_rate", "languages"] {
            if let Some(v) = body.get(k) {
                f[k] = v.clone();
            }
        }
    }
    (StatusCode::OK, Json(json!({ "user": user })))
}

fn with_freelancer<F>(mb: &MockBackend, headers: &HeaderMap, f: F) -> (StatusCode, Json<Value>)
where
    F: FnOnce(&mut Value),
{
    let uid = header(headers, "x-user-id").unwrap_or_default();
    let mut st = mb.state.lock();
    if st.fail_writes {
        return err(StatusCode::INTERNAL_SERVER_ERROR, "write failed");
    }
    match st.freelancers.get_mut(&uid) {
        Some(fp) => {
            f(fp);
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        None => err(StatusCode::NOT_FOUND, "freelancer profile not found"),
    }
}

async fn add_education(State(mb): State<MockBackend>, headers: HeaderMap, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/profile/education", &headers);
    body["_id"] = json!(mb.next_id("edu"));
    with_freelancer(&mb, &headers, |fp| fp["education"].as_array_mut().unwrap().push(body))
}

async fn delete_education(State(mb): State<MockBackend>, headers: HeaderMap, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    mb.record("DELETE", format!("/api/profile/education/{}", id), &headers);
    with_freelancer(&mb, &headers, |fp| fp["education"].as_array_mut().unwrap().retain(|e| e["_id"].as_str() != Some(id.as_str())))
}

async fn add_experience(State(mb): State<MockBackend>, headers: HeaderMap, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/profile/experience", &headers);
    body["_id"] = json!(mb.next_id("exp"));
    with_freelancer(&mb, &headers, |fp| fp["experience"].as_array_mut().unwrap().push(body))
}

async fn delete_experience(State(mb): State<MockBackend>, headers: HeaderMap, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    mb.record("DELETE", format!("/api/profile/experience/{}", id), &headers);
    with_freelancer(&mb, &headers, |fp| fp["experience"].as_array_mut().unwrap().retain(|e| e["_id"].as_str() != Some(id.as_str())))
}

async fn add_skill(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/profile/skills", &headers);
    let skill = body["skill"].clone();
    with_freelancer(&mb, &headers, |fp| {
        let skills = fp["skills"].as_array_mut().unwrap();
        if !skills.contains(&skill) {
            skills.push(skill);
        }
    })
}

async fn remove_skill(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("DELETE", "/api/profile/skills", &headers);
    let skill = body["skill"].clone();
    with_freelancer(&mb, &headers, |fp| fp["skills"].as_array_mut().unwrap().retain(|s| *s != skill))
}

async fn add_xp(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/gamification/xp", &headers);
    let Some(uid) = header(&headers, "x-user-id").filter(|u| !u.is_empty()) else {
        return err(StatusCode::UNAUTHORIZED, "user not authenticated");
    };
    let amount = body["amount"].as_u64().unwrap_or(1);
    if amount == 0 || amount > 100 {
        return err(StatusCode::BAD_REQUEST, "amount must be between 1 and 100");
    }
    let mut st = mb.state.lock();
    if st.fail_writes {
        return err(StatusCode::INTERNAL_SERVER_ERROR, "write failed");
    }
    let Some(user) = st.users.get_mut(&uid) else {
        return err(StatusCode::BAD_REQUEST, "invalid user id");
    };
    let xp = user["xp"].as_u64().unwrap_or(0) + amount;
    let level = Level::for_xp(xp);
    user["xp"] = json!(xp);
    user["level"] = json!(level.as_str());
    user["professionalism"] = json!(progress_for_xp(xp, Some(level)));
    let answer = json!({ "xp": xp, "level": level.as_str(), "professionalism": user["professionalism"] });
    (StatusCode::OK, Json(answer))
}

async fn login(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/auth/login", &headers);
    let delay = mb.state.lock().login_delay_ms;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    let st = mb.state.lock();
    match st.credentials.get(&email) {
        Some((pw, id)) if *pw == password => {
            let role = st.users.get(id).map(|u| u["role"].clone()).unwrap_or(Value::Null);
            (StatusCode::OK, Json(json!({ "user_id": id, "role": role })))
        }
        _ => err(StatusCode::UNAUTHORIZED, "invalid credentials"),
    }
}

async fn register(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/auth/register", &headers);
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let role = body["role"].as_str().unwrap_or("freelancer").to_string();
    if mb.state.lock().credentials.contains_key(&email) {
        return err(StatusCode::CONFLICT, "email already registered");
    }
    let id = mb.next_id("user");
    mb.seed_user(&id, &email, body["password"].as_str().unwrap_or_default(), &role);
    (StatusCode::CREATED, Json(json!({ "user_id": id, "role": role })))
}

async fn egov_callback(
    State(mb): State<MockBackend>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    mb.record("GET", "/api/auth/egov/callback", &headers);
    let code = q.get("code").cloned().unwrap_or_default();
    if code == "used" {
        return err(StatusCode::BAD_REQUEST, "Token exchange failed: invalid_grant");
    }
    let st = mb.state.lock();
    (StatusCode::OK, Json(json!({ "success": true, "user": st.egov_identity, "access_token": st.egov_access_token })))
}

async fn egov_verify(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/auth/egov/verify", &headers);
    let uid = header(&headers, "x-user-id").unwrap_or_default();
    let mut st = mb.state.lock();
    if let Some(s) = st.verify_status {
        return err(StatusCode::from_u16(s).unwrap(), "user not found");
    }
    let Some(user) = st.users.get_mut(&uid) else {
        return err(StatusCode::NOT_FOUND, "user not found");
    };
    user["egov_auth"] = json!(true);
    if let Some(name) = body.get("fullName") {
        user["fullName"] = name.clone();
    }
    let role = user["role"].clone();
    (StatusCode::OK, Json(json!({ "success": true, "role": role })))
}

async fn egov_register(State(mb): State<MockBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mb.record("POST", "/api/auth/egov/register", &headers);
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let existing = mb.state.lock().credentials.get(&email).map(|(_, id)| id.clone());
    let (id, is_existing) = match existing {
        Some(id) => (id, true),
        None => {
            let id = mb.next_id("user");
            mb.seed_user(&id, &email, "random", "freelancer");
            (id, false)
        }
    };
    let mut st = mb.state.lock();
    let user = st.users.get_mut(&id).unwrap();
    user["egov_auth"] = json!(true);
    let role = user["role"].clone();
    (StatusCode::OK, Json(json!({ "user_id": id, "role": role, "existing": is_existing })))
}

async fn slow(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let ms = q.get("ms").and_then(|v| v.parse().ok()).unwrap_or(1000);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept": ms }))
}

// ---- identity provider ----

#[derive(Clone, Default)]
pub struct MockIdp {
    pub token_forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl MockIdp {
    pub async fn spawn(&self) -> (String, JoinHandle<()>) {
        let app = Router::new()
            .route("/oauth2/token", post(idp_token))
            .route("/oauth2/userinfo", get(idp_userinfo))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), handle)
    }
}

async fn idp_token(State(idp): State<MockIdp>, Form(form): Form<HashMap<String, String>>) -> (StatusCode, String) {
    idp.token_forms.lock().push(form.clone());
    if form.get("grant_type").map(String::as_str) != Some("authorization_code") {
        return (StatusCode::BAD_REQUEST, "unsupported_grant_type".into());
    }
    match form.get("code").map(String::as_str) {
        Some("good-code") => (StatusCode::OK, json!({ "access_token": "idp-access", "expires_in": 3600 }).to_string()),
        Some("no-userinfo") => (StatusCode::OK, json!({ "access_token": "revoked" }).to_string()),
        _ => (StatusCode::BAD_REQUEST, "invalid_grant".into()),
    }
}

async fn idp_userinfo(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if header(&headers, "authorization").as_deref() != Some("Bearer idp-access") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_token" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "sub": "sub-42", "email": "aru@egov.kz", "phone_number": "+77010000000",
                     "iin": "990101300123", "name": "Aru Nurlanovna" })),
    )
}
