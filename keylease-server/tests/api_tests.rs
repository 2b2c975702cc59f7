mod common;

use common::{now, spawn_test_server, spawn_with, DAY};
use keylease_core::KeyStore;
use keylease_server::ApiResponse;
use pretty_assertions::assert_eq;
use std::time::Duration;

async fn body(resp: reqwest::Response) -> ApiResponse {
    resp.json().await.unwrap()
}

#[tokio::test]
async fn unknown_key_is_forbidden() {
    let server = spawn_test_server().await;

    for path in ["/api/authenticate", "/api/release"] {
        let resp = server.post_key(path, "NOPE").await;
        assert_eq!(resp.status(), 403);
        assert_eq!(
            body(resp).await,
            ApiResponse {
                success: false,
                message: "Invalid key.".into()
            }
        );
    }
}

#[tokio::test]
async fn authenticate_then_busy_then_release() {
    let server = spawn_test_server().await;
    server
        .state
        .admin
        .add_key("daily_keys", "ABC123", now() + DAY, Some("alice".into()))
        .unwrap();

    let resp = server.post_key("/api/authenticate", "ABC123").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        body(resp).await,
        ApiResponse {
            success: true,
            message: "Key accepted. Access granted.".into()
        }
    );

    let resp = server.post_key("/api/authenticate", "ABC123").await;
    assert_eq!(resp.status(), 403);
    assert_eq!(
        body(resp).await.message,
        "Key is busy. Already in use on another computer."
    );

    let resp = server.post_key("/api/release", "ABC123").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        body(resp).await,
        ApiResponse {
            success: true,
            message: "Key released.".into()
        }
    );

    let resp = server.post_key("/api/authenticate", " ABC123 ").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn expired_key_is_forbidden() {
    let server = spawn_test_server().await;
    server
        .state
        .admin
        .add_key("monthly_keys", "OLD", now() - 10, None)
        .unwrap();

    let resp = server.post_key("/api/authenticate", "OLD").await;
    assert_eq!(resp.status(), 403);
    assert_eq!(
        body(resp).await.message,
        "Key expired. Please purchase a new key."
    );
}

#[tokio::test]
async fn missing_key_field_is_invalid() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/authenticate"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(body(resp).await.message, "Invalid key.");
}

#[tokio::test]
async fn non_json_body_is_invalid() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/authenticate"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body = body(resp).await;
    assert!(!body.success);
    assert_eq!(body.message, "Invalid key.");
}

#[tokio::test]
async fn non_string_key_is_invalid() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/release"))
        .json(&serde_json::json!({ "key": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(body(resp).await.message, "Invalid key.");
}

#[tokio::test]
async fn missing_content_type_is_invalid() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/authenticate"))
        .body(r#"{"key":"X"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(body(resp).await.message, "Invalid key.");
}

#[tokio::test]
async fn response_content_type_is_json() {
    let server = spawn_test_server().await;
    let resp = server.post_key("/api/authenticate", "X").await;
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("application/json"));
}

#[tokio::test]
async fn concurrent_authenticate_has_one_winner() {
    let server = spawn_test_server().await;
    server
        .state
        .admin
        .add_key("daily", "HOT", now() + DAY, None)
        .unwrap();

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let client = server.client.clone();
        let url = server.url("/api/authenticate");
        set.spawn(async move {
            client
                .post(url)
                .json(&serde_json::json!({ "key": "HOT" }))
                .send()
                .await
                .unwrap()
                .status()
        });
    }

    let mut accepted = 0;
    while let Some(status) = set.join_next().await {
        let status = status.unwrap();
        if status == 200 {
            accepted += 1;
        } else {
            assert_eq!(status, 403);
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn storage_failure_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let server = spawn_with(KeyStore::open(data_dir.join("keys.json")).unwrap()).await;
    server
        .state
        .admin
        .add_key("daily", "K", now() + DAY, None)
        .unwrap();

    std::fs::remove_dir_all(&data_dir).unwrap();
    std::fs::write(&data_dir, b"in the way").unwrap();

    let resp = server.post_key("/api/authenticate", "K").await;
    assert_eq!(resp.status(), 500);
    assert!(!body(resp).await.success);

    // The failed lease was not granted in memory either.
    let view = server.state.leases.inspect("K", now()).unwrap();
    assert!(!view.record.in_use);
}

#[tokio::test]
async fn health_reports_key_count() {
    let server = spawn_test_server().await;
    server.state.admin.add_key("daily", "A", 0, None).unwrap();
    server.state.admin.add_key("monthly", "B", 0, None).unwrap();

    let resp = server.client.get(server.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["keys"], 2);
}

// The runtime here is single-threaded, so a handler that blocked on the store lock
// would stall the timer below until the holder gave up waiting.
#[tokio::test]
async fn health_does_not_block_the_runtime_on_the_store_lock() {
    let server = spawn_test_server().await;
    let store = server.state.leases.store().clone();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let holder = std::thread::spawn(move || {
        store
            .transact(|_| {
                ready_tx.send(()).unwrap();
                Ok(release_rx.recv_timeout(Duration::from_secs(2)).is_ok())
            })
            .unwrap()
    });
    ready_rx.recv().unwrap();

    let client = server.client.clone();
    let url = server.url("/api/health");
    let request = tokio::spawn(async move { client.get(url).send().await.unwrap().status() });
    tokio::time::sleep(Duration::from_millis(200)).await;
    release_tx.send(()).unwrap();

    assert!(holder.join().unwrap(), "runtime stalled while the store was locked");
    assert_eq!(request.await.unwrap(), 200);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = spawn_test_server().await;
    let resp = server.client.get(server.url("/api/nonexistent")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}
