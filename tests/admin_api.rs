//! Admin API round trips over a real listener.

use reqwest::StatusCode;
use serde_json::{json, Value};

use route_reloader::admin::handlers::ChangeReceipt;
use route_reloader::events::ChangeBatch;

mod common;
use common::{add_route, spawn_pipeline, start_admin};

#[tokio::test]
async fn test_status_and_routes() {
    let p = spawn_pipeline();
    p.reloads
        .submit_and_wait(ChangeBatch::new(add_route(0, "orders", "http://orders", &["Path=/orders/**"])))
        .await
        .unwrap();
    let addr = start_admin(&p, None).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("http://{}/admin/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["generation"], 1);
    assert_eq!(status["route_count"], 1);
    assert_eq!(status["state"], "idle");
    assert!(status["last_failure"].is_null());

    let routes: Value = client
        .get(format!("http://{}/admin/routes", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes["routes"][0]["id"], "orders");
    assert_eq!(routes["routes"][0]["predicates"][0]["name"], "Path");
}

#[tokio::test]
async fn test_push_then_match() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, None).await;
    let client = reqwest::Client::new();

    let events = json!([
        {"key": "gateway.routes[0].id", "new_value": "users", "kind": "ADDED"},
        {"key": "gateway.routes[0].uri", "new_value": "http://users:8080", "kind": "ADDED"},
        {"key": "gateway.routes[0].predicates[0]", "new_value": "Path=/users/**", "kind": "ADDED"},
        {"key": "gateway.routes[0].predicates[1]", "new_value": "Method=GET", "kind": "ADDED"},
    ]);
    let res = client
        .post(format!("http://{}/admin/changes?wait=true", addr))
        .json(&events)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: ChangeReceipt = res.json().await.unwrap();
    assert_eq!(receipt.outcome.as_deref(), Some("published"));
    assert_eq!(receipt.generation, Some(1));

    let res = client
        .get(format!("http://{}/admin/match", addr))
        .query(&[("path", "/users/42"), ("method", "get")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let matched: Value = res.json().await.unwrap();
    assert_eq!(matched["route"]["id"], "users");

    let res = client
        .get(format!("http://{}/admin/match", addr))
        .query(&[("path", "/users/42"), ("method", "DELETE")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_push_without_wait_is_accepted() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, None).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}/admin/changes", addr))
        .json(&json!([{"key": "gateway.routes[0].id", "new_value": "a", "kind": "ADDED"}]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let receipt: ChangeReceipt = res.json().await.unwrap();
    assert!(receipt.outcome.is_none());
}

#[tokio::test]
async fn test_invalid_push_reports_errors() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, None).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{}/admin/changes?wait=true", addr))
        .json(&json!([
            {"key": "gateway.routes[0].id", "new_value": "broken", "kind": "ADDED"},
            {"key": "gateway.routes[0].uri", "new_value": "http://x", "kind": "ADDED"},
            {"key": "gateway.routes[0].predicates[0]", "new_value": "Teleport=/x", "kind": "ADDED"},
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let receipt: ChangeReceipt = res.json().await.unwrap();
    assert_eq!(receipt.outcome.as_deref(), Some("failed"));
    assert_eq!(receipt.generation, Some(0));
    assert_eq!(receipt.errors.len(), 1);
    assert!(receipt.errors[0].contains("broken"));

    let status: Value = client
        .get(format!("http://{}/admin/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "idle");
    let failure = &status["last_failure"];
    assert_eq!(failure["batch_id"], receipt.batch_id.to_string());
    assert_eq!(failure["generation"], 0);
    assert!(failure["details"][0].as_str().unwrap().contains("broken"));
}

#[tokio::test]
async fn test_ping_echoes_name_with_fresh_id() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, None).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/admin/ping", addr);

    let first: Value = client
        .get(&url)
        .query(&[("name", "edge-1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["name"], "edge-1");
    let id = first["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let second: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert!(second.get("name").is_none());
    assert_ne!(second["id"], first["id"]);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, Some("s3cret")).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/admin/status", addr);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(&url).bearer_auth("wrong").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(&url).bearer_auth("s3cret").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_match_method() {
    let p = spawn_pipeline();
    let addr = start_admin(&p, None).await;

    let res = reqwest::Client::new()
        .get(format!("http://{}/admin/match", addr))
        .query(&[("path", "/x"), ("method", "NOT A METHOD")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
