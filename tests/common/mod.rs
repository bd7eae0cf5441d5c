//! Common test utilities for E2E tests

#![allow(dead_code)]

use rapport::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// An account provisioned through the API, with a bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_max_connections(64).await
    }

    pub async fn with_max_connections(max_connections: usize) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                cors_origin: "*".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 4,
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            },
            chat: config::ChatConfig {
                max_message_chars: 500,
                preview_chars: 50,
            },
            realtime: config::RealtimeConfig {
                max_connections,
                outbound_buffer: 256,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        rapport::metrics::init_metrics();

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = rapport::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// WebSocket URL for the realtime channel, authenticated by query token
    pub fn ws_url(&self, token: &str) -> String {
        format!(
            "{}/api/v1/realtime?access_token={}",
            self.addr.replacen("http://", "ws://", 1),
            token
        )
    }

    /// Create a session token for an account id
    pub fn create_test_token(&self, account_id: &str) -> String {
        use chrono::{Duration, Utc};
        use rapport::auth::session::{Session, create_session_token};

        let session = Session {
            account_id: account_id.to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(7),
        };

        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Provision an account through `POST /api/v1/accounts`
    pub async fn create_user(&self, username: &str, is_private: bool) -> TestUser {
        let id = rapport::data::EntityId::new().0;
        let token = self.create_test_token(&id);

        let response = self
            .client
            .post(self.url("/api/v1/accounts"))
            .bearer_auth(&token)
            .json(&json!({
                "username": username,
                "displayName": username.to_uppercase(),
                "isPrivate": is_private,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "account provisioning failed");

        TestUser { id, token }
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put_json(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Follow `target` as `user` and return the response body
    pub async fn follow(&self, user: &TestUser, target: &TestUser) -> Value {
        let response = self
            .post(user, &format!("/api/v1/follow/{}", target.id))
            .await;
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    pub async fn status(&self, user: &TestUser, target: &TestUser) -> String {
        let response = self
            .get(user, &format!("/api/v1/status/{}", target.id))
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["status"].as_str().unwrap().to_string()
    }

    pub async fn send_message(&self, from: &TestUser, to: &TestUser, text: &str) -> reqwest::Response {
        self.post_json(
            from,
            &format!("/api/v1/chat/{}/send", to.id),
            json!({ "text": text }),
        )
        .await
    }

    pub async fn set_private(&self, user: &TestUser, is_private: bool) {
        let response = self
            .put_json(
                user,
                "/api/v1/accounts/me/privacy",
                json!({ "isPrivate": is_private }),
            )
            .await;
        assert_eq!(response.status(), 200);
    }
}
