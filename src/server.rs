//!
//! freelancekz HTTP gateway
//! ------------------------
//! Thin axum front for the marketplace client. It holds no session state; it only
//! answers health probes and carries the eGov.kz redirect dance:
//!
//! - `GET /api/ping`, `GET /api/health`: liveness.
//! - `GET /auth/egov/callback`: relays the provider redirect to the front end's
//!   callback route, forwarding `code`, `error` and `state` (empty when absent).
//! - `GET /api/auth/egov/authorize`: redirects to the provider's authorize URL.
//! - `GET /api/auth/egov/callback`: backend code exchange plus userinfo lookup. This
//!   is the only place the client secret is used.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::egov::EgovAuthService;
use crate::error::AppError;

#[derive(Clone)]
pub struct GatewayState {
    cfg: Arc<AppConfig>,
    egov: EgovAuthService,
}

impl GatewayState {
    pub fn new(cfg: AppConfig) -> anyhow::Result<Self> {
        let egov = EgovAuthService::new(cfg.egov.clone()).context("building eGov client")?;
        Ok(Self { cfg: Arc::new(cfg), egov })
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/health", get(health))
        .route("/auth/egov/callback", get(relay_callback))
        .route("/api/auth/egov/authorize", get(authorize))
        .route("/api/auth/egov/callback", get(exchange_callback))
        .with_state(state)
}

/// Serve on an already-bound listener. Tests bind `127.0.0.1:0` and pass it in.
pub async fn serve(listener: tokio::net::TcpListener, cfg: AppConfig) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = router(GatewayState::new(cfg)?);
    info!(target: "server", %addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.gateway_port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    serve(listener, cfg).await
}

fn found(location: String) -> Response { (StatusCode::FOUND, [(header::LOCATION, location)]).into_response() }

fn param<'a>(q: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    q.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

async fn ping(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({ "message": state.cfg.ping_message }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now().to_rfc3339() }))
}

async fn relay_callback(State(state): State<GatewayState>, Query(q): Query<HashMap<String, String>>) -> Response {
    let enc = |k: &str| urlencoding::encode(param(&q, k).unwrap_or("")).into_owned();
    let target = format!(
        "{}/auth/egov/callback?code={}&error={}&state={}",
        state.cfg.frontend_url.trim_end_matches('/'),
        enc("code"),
        enc("error"),
        enc("state"),
    );
    info!(target: "server", has_code = param(&q, "code").is_some(), has_error = param(&q, "error").is_some(), "relaying provider callback");
    found(target)
}

async fn authorize(State(state): State<GatewayState>, Query(q): Query<HashMap<String, String>>) -> Response {
    found(state.egov.authorization_url(param(&q, "state")))
}

async fn exchange_callback(State(state): State<GatewayState>, Query(q): Query<HashMap<String, String>>) -> Response {
    if let Some(err) = param(&q, "error") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": format!("eGov error: {}", err) }))).into_response();
    }
    let Some(code) = param(&q, "code") else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "No authorization code received" }))).into_response();
    };

    let result = async {
        let tokens = state.egov.exchange_code_for_token(code).await?;
        let identity = state.egov.user_info(&tokens.access_token).await?;
        Ok::<_, AppError>((tokens, identity))
    }
    .await;

    match result {
        Ok((tokens, identity)) => Json(json!({
            "success": true,
            "user": {
                "id": identity.id,
                "email": identity.email,
                "phone": identity.phone,
                "iin": identity.iin,
                "fullName": identity.full_name,
            },
            "access_token": tokens.access_token,
        }))
        .into_response(),
        // provider rejections carry their user-facing text
        Err(e @ AppError::Provider { .. }) => {
            warn!(target: "server", error = %e, "eGov exchange rejected");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.message() }))).into_response()
        }
        Err(e) => {
            warn!(target: "server", error = %e, "eGov exchange failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.message() }))).into_response()
        }
    }
}
