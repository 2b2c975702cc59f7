//! Shared helpers for HTTP tests.

#![allow(dead_code)]

use keylease_core::KeyStore;
use keylease_server::{build_router, AppState, SessionStore};
use serde_json::json;

pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const DAY: i64 = 24 * 60 * 60;

/// A running server and a handle to its state.
pub struct TestServer {
    pub base: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn post_key(&self, path: &str, key: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&json!({ "key": key }))
            .send()
            .await
            .unwrap()
    }

    /// Logs in as admin and returns the bearer token.
    pub async fn login(&self) -> String {
        let resp = self
            .client
            .post(self.url("/admin/login"))
            .json(&json!({ "password": ADMIN_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

/// Spin up the HTTP server on an OS-assigned port over `store`.
pub async fn spawn_with(store: KeyStore) -> TestServer {
    let state = AppState::new(store, SessionStore::new(Some(ADMIN_PASSWORD), 3600));
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        state,
        client: reqwest::Client::new(),
    }
}

/// Spin up a server over an empty in-memory store.
pub async fn spawn_test_server() -> TestServer {
    spawn_with(KeyStore::open_in_memory()).await
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
