mod common;

use common::MockIdp;
use freelancekz::config::AppConfig;
use freelancekz::egov::EgovConfig;
use serde_json::Value;

async fn start_gateway(idp_base: &str) -> String {
    let cfg = AppConfig {
        frontend_url: "http://front.test:8080".into(),
        ping_message: "pong from test".into(),
        egov: EgovConfig {
            base_url: idp_base.to_string(),
            client_secret: Some("s3cret".into()),
            ..EgovConfig::default()
        },
        ..AppConfig::default()
    };
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(e) = freelancekz::server::serve(listener, cfg).await {
            freelancekz::tprintln!("gateway task error: {e:?}");
        }
    });
    format!("http://{}", addr)
}

fn no_redirects() -> reqwest::Client {
    reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

#[tokio::test]
async fn ping_and_health() {
    let base = start_gateway("http://127.0.0.1:9").await;
    let v: Value = reqwest::get(format!("{}/api/ping", base)).await.unwrap().json().await.unwrap();
    assert_eq!(v["message"], "pong from test");
    let v: Value = reqwest::get(format!("{}/api/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(v["status"], "ok");
    assert!(v["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn provider_redirect_is_relayed_to_front_end() {
    let base = start_gateway("http://127.0.0.1:9").await;
    let resp = no_redirects().get(format!("{}/auth/egov/callback?code=a%2Fb&state=verify", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 302);
    let loc = resp.headers()["location"].to_str().unwrap();
    assert_eq!(loc, "http://front.test:8080/auth/egov/callback?code=a%2Fb&error=&state=verify");
}

#[tokio::test]
async fn authorize_redirects_to_provider() {
    let base = start_gateway("https://idp.example").await;
    let resp = no_redirects().get(format!("{}/api/auth/egov/authorize?state=login", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 302);
    let loc = resp.headers()["location"].to_str().unwrap();
    assert!(loc.starts_with("https://idp.example/oauth2/authorize?client_id=freelancekz-app"));
    assert!(loc.ends_with("&state=login"));
    assert!(!loc.contains("s3cret"));
}

#[tokio::test]
async fn code_exchange_returns_identity() {
    let idp = MockIdp::default();
    let (idp_base, _h) = idp.spawn().await;
    let base = start_gateway(&idp_base).await;

    let resp = reqwest::get(format!("{}/api/auth/egov/callback?code=good-code&state=verify", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["success"], true);
    assert_eq!(v["access_token"], "idp-access");
    assert_eq!(v["user"]["id"], "sub-42");
    assert_eq!(v["user"]["fullName"], "Aru Nurlanovna");
    assert_eq!(v["user"]["phone"], "+77010000000");

    let forms = idp.token_forms.lock().clone();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["client_secret"], "s3cret");
    assert_eq!(forms[0]["redirect_uri"], "http://localhost:8080/auth/egov/callback");
}

#[tokio::test]
async fn code_exchange_errors() {
    let idp = MockIdp::default();
    let (idp_base, _h) = idp.spawn().await;
    let base = start_gateway(&idp_base).await;

    let cases = [
        ("error=access_denied", "eGov error: access_denied"),
        ("code=", "No authorization code received"),
        ("code=bad", "Token exchange failed: invalid_grant"),
        ("code=no-userinfo", "Failed to get user info"),
    ];
    for (query, expected) in cases {
        let resp = reqwest::get(format!("{}/api/auth/egov/callback?{}", base, query)).await.unwrap();
        assert_eq!(resp.status().as_u16(), 400, "{query}");
        let v: Value = resp.json().await.unwrap();
        assert_eq!(v["error"], expected, "{query}");
    }
    // only the two calls that carried a code reached the token endpoint
    assert_eq!(idp.token_forms.lock().len(), 2);
}
