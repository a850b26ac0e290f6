#![allow(dead_code)]

use axum_test::TestServer;
use grocery_server::core::{AppState, Config, Database};
use grocery_server::events::{DomainEvent, EventBus};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_JWT_SECRET: &str = "grocery-test-secret-not-for-production";
pub const TEST_AUDIENCE: &str = "authenticated";

/// Keeps every published event so tests can assert on what was emitted.
#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingBus {
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(DomainEvent::name)
            .collect()
    }

    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Configuration pointing at a fresh media directory under the system temp dir.
pub fn test_config() -> Config {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let media_root = std::env::temp_dir().join(format!(
        "grocery-test-media-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));

    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_audience: TEST_AUDIENCE.to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        max_connections: 1,
        invitation_ttl_hours: 168,
        media_root: media_root.to_string_lossy().into_owned(),
        public_base_url: "http://localhost/media".to_string(),
        app_env: "test".to_string(),
    }
}

/// State over a private in-memory database, with events recorded instead of delivered.
pub async fn create_test_state() -> (Arc<AppState>, Arc<RecordingBus>) {
    let db = Database::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let bus = Arc::new(RecordingBus::default());
    let state = AppState::with_event_bus(db, test_config(), bus.clone());
    (Arc::new(state), bus)
}

/// State wired to the real WebSocket bridge.
pub async fn create_realtime_state() -> Arc<AppState> {
    let db = Database::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(AppState::new(db, test_config()))
}

pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = grocery_server::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Signs a provider-style token, valid for one hour.
pub fn create_test_jwt(sub: &str, email: Option<&str>, secret: &str) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        email: Option<&'a str>,
        aud: &'a str,
        exp: usize,
        iat: usize,
    }

    let now = Utc::now();
    let claims = Claims {
        sub,
        email,
        aud: TEST_AUDIENCE,
        exp: (now + Duration::hours(1)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to create JWT token")
}

/// A provisioned test user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
    pub user_code: String,
}

pub async fn register_user(server: &TestServer, sub: &str, first_name: &str) -> TestUser {
    let email = format!("{sub}@example.com");
    let token = create_test_jwt(sub, Some(&email), TEST_JWT_SECRET);

    let response = server
        .post("/auth/register")
        .authorization_bearer(&token)
        .json(&json!({ "first_name": first_name, "last_name": "Tester" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    TestUser {
        id: sub.to_string(),
        token,
        user_code: body["data"]["user_code"]
            .as_str()
            .expect("user_code in response")
            .to_string(),
    }
}

/// `from` proposes a group to `to`, who accepts. Returns the new group id.
pub async fn found_group(server: &TestServer, from: &TestUser, to: &TestUser, name: &str) -> i64 {
    let proposal: Value = server
        .post("/invitations/start-group")
        .authorization_bearer(&from.token)
        .json(&json!({ "to_user_code": to.user_code, "group_name": name }))
        .await
        .json();
    let invitation_id = proposal["data"]["id"].as_i64().expect("invitation id");

    let accepted: Value = server
        .post(&format!("/invitations/{invitation_id}/accept"))
        .authorization_bearer(&to.token)
        .await
        .json();
    accepted["data"]["group"]["id"].as_i64().expect("group id")
}

/// Invites `user` into `group_id` on behalf of `member`, and accepts.
pub async fn invite_and_join(server: &TestServer, member: &TestUser, user: &TestUser, group_id: i64) {
    let invite: Value = server
        .post("/invitations/invite")
        .authorization_bearer(&member.token)
        .json(&json!({ "to_user_code": user.user_code, "group_id": group_id }))
        .await
        .json();
    let invitation_id = invite["data"]["id"].as_i64().expect("invitation id");

    server
        .post(&format!("/invitations/{invitation_id}/accept"))
        .authorization_bearer(&user.token)
        .await
        .assert_status_ok();
}

pub async fn group_code(server: &TestServer, member: &TestUser, group_id: i64) -> String {
    let body: Value = server
        .get(&format!("/groups/{group_id}"))
        .authorization_bearer(&member.token)
        .await
        .json();
    body["data"]["group_code"]
        .as_str()
        .expect("group_code")
        .to_string()
}
