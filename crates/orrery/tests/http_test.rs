//! # HTTP Integration Test
//!
//! The router served on a loopback port, backed by the memory store and a
//! scripted identity exchange.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use orrery::config::OrreryConfig;
use orrery::security::{IdentityExchange, ProviderConfig};
use orrery::shared::{Error, ManualClock, ProviderIdentity, Result};
use orrery::store::{FailPoint, MemoryStore};
use orrery::{serve, AppState};
use reqwest::header::{LOCATION, SET_COOKIE, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const ADMIN: &str = "test-admin-token";

/// Answers every code with a fixed identity, or fails when it has none.
struct ScriptedExchange {
    identity: Option<ProviderIdentity>,
}

#[async_trait]
impl IdentityExchange for ScriptedExchange {
    async fn exchange(
        &self,
        provider: &str,
        _config: &ProviderConfig,
        code: &str,
    ) -> Result<ProviderIdentity> {
        match &self.identity {
            Some(identity) if code == "good-code" => Ok(ProviderIdentity {
                provider: provider.to_string(),
                ..identity.clone()
            }),
            _ => Err(Error::external("token endpoint rejected the code")),
        }
    }
}

fn config() -> OrreryConfig {
    let mut config = OrreryConfig::default();
    config.auth.admin_token = ADMIN.to_string();
    config.auth.client_url = "http://client.test/".to_string();
    config.auth.error_url = "http://client.test/login".to_string();
    config.auth.providers.insert(
        "github".to_string(),
        ProviderConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            authorize_url: "https://github.test/login/oauth/authorize".into(),
            token_url: "https://github.test/login/oauth/access_token".into(),
            userinfo_url: "https://api.github.test/user".into(),
            emails_url: None,
            redirect_url: "http://localhost/auth/github/callback".into(),
            scopes: vec!["read:user".into()],
        },
    );
    config
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    store: MemoryStore,
    clock: ManualClock,
    state: AppState,
}

impl TestServer {
    async fn start(exchange: ScriptedExchange) -> Self {
        let clock = ManualClock::default();
        let store = MemoryStore::new(Arc::new(clock.clone()));
        let state = AppState::new(
            config(),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            Arc::new(exchange),
        );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state.clone()));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base: format!("http://{addr}"),
            client,
            store,
            clock,
            state,
        }
    }

    async fn octocat() -> Self {
        Self::start(ScriptedExchange {
            identity: Some(ProviderIdentity {
                provider: String::new(),
                provider_user_id: "583231".into(),
                display_name: "octocat".into(),
                email: Some("octocat@example.com".into()),
            }),
        })
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn create_run(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/admin/runs"))
            .header("X-Admin-Token", ADMIN)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Starts a login and returns the issued state token.
    async fn begin_login(&self, user_agent: &str) -> String {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = Url::parse(location(&response)).unwrap();
        assert_eq!(location.host_str(), Some("github.test"));
        location
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    async fn callback(&self, query: &str, user_agent: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/auth/github/callback?{query}")))
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .unwrap()
    }
}

fn location(response: &reqwest::Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

async fn error_body(response: reqwest::Response) -> Value {
    response.json::<Value>().await.unwrap()
}

// =============================================================================
// ADMIN & TRAVERSAL
// =============================================================================

#[tokio::test]
async fn test_health() {
    let server = TestServer::octocat().await;
    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_admin_guard() {
    let server = TestServer::octocat().await;

    let response = server
        .client
        .post(server.url("/admin/runs"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = error_body(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["code"], 401);

    // Same length, prefix, and extension of the real token.
    for token in ["wrong", "test-admin-tokeN", "test-admin", "test-admin-token-2"] {
        let response = server
            .client
            .post(server.url("/admin/runs"))
            .header("X-Admin-Token", token)
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token}");
        assert_eq!(error_body(response).await["message"], "invalid admin token");
    }
    assert_eq!(server.store.counts().await.runs, 0);
}

#[tokio::test]
async fn test_create_and_walk_a_run() {
    let server = TestServer::octocat().await;
    let response = server
        .create_run(&json!({
            "game": {"name": "Alpha Run", "seed": "feedface"},
            "universe": {"galaxy_count": 2, "sectors_per_galaxy": 2, "systems_per_sector": 2,
                         "min_planets_per_system": 1, "max_planets_per_system": 1}
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let run: Value = response.json().await.unwrap();
    assert_eq!(run["status"], "active");
    assert_eq!(run["current_turn"], 1);
    assert_eq!(run["planet_count"], 8);
    assert_eq!(run["seed"], "feedface");

    let root = run["root_spatial_id"].as_i64().unwrap();
    let galaxies: Vec<Value> = server
        .get(&format!("/spatial/{root}/children"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(galaxies.len(), 2);
    assert_eq!(galaxies[0]["entity_type"], "galaxy");
    assert_eq!(galaxies[1]["y_coord"], 1);

    let galaxy = galaxies[0]["id"].as_i64().unwrap();
    let sectors: Vec<Value> = server
        .get(&format!("/spatial/{galaxy}/children"))
        .await
        .json()
        .await
        .unwrap();
    let sector = sectors[0]["id"].as_i64().unwrap();
    let systems: Vec<Value> = server
        .get(&format!("/spatial/{sector}/children"))
        .await
        .json()
        .await
        .unwrap();
    let system = systems[1]["id"].as_i64().unwrap();

    let ancestors: Vec<Value> = server
        .get(&format!("/spatial/{system}/ancestors"))
        .await
        .json()
        .await
        .unwrap();
    let levels: Vec<_> = ancestors.iter().map(|e| e["level"].as_i64().unwrap()).collect();
    assert_eq!(levels, vec![0, 1, 2, 3]);
    assert_eq!(ancestors[0]["name"], "Alpha Run");

    let planets: Vec<Value> = server
        .get(&format!("/systems/{system}/planets"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(planets.len(), 1);
    assert_eq!(planets[0]["name"], "Planet I");
    assert!(planets[0]["type"].is_string());
}

#[tokio::test]
async fn test_error_rendering() {
    let server = TestServer::octocat().await;

    let response = server.get("/spatial/999/children").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = error_body(response).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["code"], 404);
    assert!(body["message"].is_string());

    let response = server.get("/spatial/999/ancestors").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.get("/spatial/abc/children").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get("/no/such/route").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server
        .client
        .delete(server.url("/spatial/1/children"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_body(response).await["error"], "method_not_allowed");
}

#[tokio::test]
async fn test_bad_create_requests() {
    let server = TestServer::octocat().await;

    let response = server.create_run(&json!({"game": {"seed": "xy"}})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await["error"], "validation");

    let response = server
        .client
        .post(server.url("/admin/runs"))
        .header("X-Admin-Token", ADMIN)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.store.counts().await.runs, 0);
}

#[tokio::test]
async fn test_planets_of_a_non_system() {
    let server = TestServer::octocat().await;
    let run: Value = server
        .create_run(&json!({"game": {"seed": "abc"}, "universe": {"galaxy_count": 1,
            "sectors_per_galaxy": 1, "systems_per_sector": 1}}))
        .await
        .json()
        .await
        .unwrap();
    let root = run["root_spatial_id"].as_i64().unwrap();
    let response = server.get(&format!("/systems/{root}/planets")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// OAUTH
// =============================================================================

#[tokio::test]
async fn test_login_round_trip() {
    let server = TestServer::octocat().await;
    let state = server.begin_login("firefox").await;
    assert_eq!(state.len(), 43);

    let response = server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "http://client.test/?login=success");

    let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("orrery_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"));

    let token = cookie
        .trim_start_matches("orrery_session=")
        .split(';')
        .next()
        .unwrap();
    let session = server.state.sessions.lookup(token).unwrap();
    let (name, email) = server.store.player(session.player_id).await.unwrap();
    assert_eq!(name, "octocat");
    assert_eq!(email.as_deref(), Some("octocat@example.com"));

    // Same identity again: same player.
    let state = server.begin_login("firefox").await;
    server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(server.store.counts().await.players, 1);
}

#[tokio::test]
async fn test_state_is_single_use() {
    let server = TestServer::octocat().await;
    let state = server.begin_login("firefox").await;

    let first = server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(location(&first), "http://client.test/?login=success");

    let replay = server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(location(&replay), "http://client.test/login?error=auth_error");
    assert!(replay.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_expired_state() {
    let server = TestServer::octocat().await;
    let state = server.begin_login("firefox").await;
    server.clock.advance(TimeDelta::minutes(11));

    let response = server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(location(&response), "http://client.test/login?error=auth_error");
}

#[tokio::test]
async fn test_fingerprint_mismatch_is_soft_by_default() {
    let server = TestServer::octocat().await;
    let state = server.begin_login("firefox").await;
    let response = server
        .callback(&format!("code=good-code&state={state}"), "curl")
        .await;
    assert_eq!(location(&response), "http://client.test/?login=success");
}

#[tokio::test]
async fn test_callback_failure_codes() {
    let server = TestServer::octocat().await;

    let state = server.begin_login("firefox").await;
    let response = server
        .callback(&format!("error=access_denied&state={state}"), "firefox")
        .await;
    assert_eq!(location(&response), "http://client.test/login?error=oauth_denied");
    assert!(server.state.states.peek(&state).is_none());

    let response = server.callback("code=good-code", "firefox").await;
    assert_eq!(location(&response), "http://client.test/login?error=auth_error");

    let state = server.begin_login("firefox").await;
    let response = server
        .callback(&format!("code=bad-code&state={state}"), "firefox")
        .await;
    assert_eq!(location(&response), "http://client.test/login?error=oauth_error");

    server.store.inject_failure(Some(FailPoint::Commit)).await;
    let state = server.begin_login("firefox").await;
    let response = server
        .callback(&format!("code=good-code&state={state}"), "firefox")
        .await;
    assert_eq!(location(&response), "http://client.test/login?error=database_error");
    server.store.inject_failure(None).await;
    assert_eq!(server.store.counts().await.players, 0);
}

#[tokio::test]
async fn test_unknown_provider() {
    let server = TestServer::octocat().await;
    let response = server.get("/auth/myspace").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_body(response).await["error"], "not_found");
    assert_eq!(server.state.states.stats().live, 0);
}
