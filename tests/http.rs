//! HTTP boundary integration tests
//!
//! Starts the axum router on a real listener and exercises the route set
//! with reqwest.

use std::sync::Arc;

use schemavault::{server, SchemaRegistry};
use serde_json::json;
use tempfile::TempDir;

/// Bind to port 0 and return the base url; the TempDir keeps the registry
/// root alive for the duration of the test.
async fn start_server() -> (String, TempDir) {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SchemaRegistry::open(dir.path()).unwrap());
    let app = server::router(registry, false);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), dir)
}

#[tokio::test]
async fn register_and_fetch() {
    let (base, _dir) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/subjects/foo/versions"))
        .json(&json!({ "schema": "schemaA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "id": 1 }));

    let resp = client
        .get(format!("{base}/schemas/ids/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "schema": "schemaA" }));

    let resp = client
        .get(format!("{base}/schemas/ids/1/schema"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "schemaA");

    let resp = client
        .get(format!("{base}/subjects/foo/versions/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "subject": "foo", "version": 1, "id": 1, "schema": "schemaA" })
    );

    let resp = client
        .get(format!("{base}/subjects/foo/versions"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!([1]));

    let resp = client.get(format!("{base}/subjects")).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!(["foo"]));
}

#[tokio::test]
async fn check_schema_under_subject() {
    let (base, _dir) = start_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/subjects/foo/versions"))
        .json(&json!({ "schema": "schemaA" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/subjects/foo"))
        .json(&json!({ "schema": "schemaA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["version"], 1);
    assert_eq!(body["id"], 1);

    let resp = client
        .post(format!("{base}/subjects/foo"))
        .json(&json!({ "schema": "never registered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error_code"], 404);
}

#[tokio::test]
async fn missing_resources_return_404_envelopes() {
    let (base, _dir) = start_server().await;
    let client = reqwest::Client::new();

    for path in [
        "/schemas/ids/99",
        "/subjects/nope/versions",
        "/subjects/nope/versions/1",
        "/subjects/nope/versions/1/schema",
    ] {
        let resp = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), 404, "{path}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error_code"], 404, "{path}");
        assert!(body["message"].is_string(), "{path}");
    }
}

#[tokio::test]
async fn bad_numbers_return_400() {
    let (base, _dir) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/schemas/ids/not-a-number"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error_code"], 400);
}

#[tokio::test]
async fn delete_lifecycle_over_http() {
    let (base, _dir) = start_server().await;
    let client = reqwest::Client::new();

    for schema in ["schemaA", "schemaB"] {
        client
            .post(format!("{base}/subjects/foo/versions"))
            .json(&json!({ "schema": schema }))
            .send()
            .await
            .unwrap();
    }

    // soft delete answers with the bare version number
    let resp = client
        .delete(format!("{base}/subjects/foo/versions/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!(1));

    // repeat soft delete is gone
    let resp = client
        .delete(format!("{base}/subjects/foo/versions/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // permanent purge of the soft-deleted version
    let resp = client
        .delete(format!("{base}/subjects/foo/versions/1?permanent=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client.get(format!("{base}/schemas/ids/1")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    // whole-subject delete returns the removed versions
    let resp = client
        .delete(format!("{base}/subjects/foo"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!([2]));
}
