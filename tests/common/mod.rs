//! Shared harness: a server on a random port backed by in-memory stores

#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use tokenwarden::accounts::{AccountStore, InMemoryAccountStore};
use tokenwarden::auth::{AuthService, InMemoryRevocationStore, RevocationStore, TokenCodec};
use tokenwarden::configuration::{BruteForceSettings, JwtSettings, RateLimitSettings};
use tokenwarden::startup::{run, AppState};
use tokenwarden::validators::PasswordPolicy;

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "Teste@7890Ab";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

pub struct TestOptions {
    pub requests_per_window: u32,
    pub max_attempts: u32,
    pub accounts: Arc<dyn AccountStore>,
    pub revocations: Arc<dyn RevocationStore>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            requests_per_window: 1000,
            max_attempts: 1000,
            accounts: Arc::new(InMemoryAccountStore::new()),
            revocations: Arc::new(InMemoryRevocationStore::new()),
        }
    }
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_token_secret: "integration-access-secret-0123456789abcdef".to_string(),
        refresh_token_secret: "integration-refresh-secret-0123456789abcdef".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "tokenwarden-test".to_string(),
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(TestOptions::default())
}

pub fn spawn_app_with(options: TestOptions) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let auth = AuthService::new(
        options.accounts,
        options.revocations,
        TokenCodec::new(&jwt_settings()),
        PasswordPolicy::default(),
        4,
    );
    let rate_limit = RateLimitSettings {
        requests_per_window: options.requests_per_window,
        ..RateLimitSettings::default()
    };
    let brute_force = BruteForceSettings {
        max_attempts: options.max_attempts,
        ..BruteForceSettings::default()
    };
    let state = AppState::new(auth, &rate_limit, &brute_force);

    let server = run(listener, state).expect("Failed to start server");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/register", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn logout(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/logout", &json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn get_me(&self, bearer: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/api/me", self.address));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn health_check(&self) -> reqwest::Response {
        self.client
            .get(&format!("{}/health_check", self.address))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register the default account and return the login response body
    pub async fn registered_login(&self) -> Value {
        assert_eq!(self.register(EMAIL, PASSWORD).await.status().as_u16(), 201);
        let response = self.login(EMAIL, PASSWORD).await;
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse response")
    }
}

pub fn token(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {} in {}", field, body))
        .to_string()
}
