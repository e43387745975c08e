//! HTTP API tests driving the router in-process.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use territoires::server::config::ServerConfig;
use territoires::server::{ServerState, build_router};
use territoires::InMemoryReferenceStore;
use tower::ServiceExt;

fn app(config: ServerConfig) -> Router {
    let store = InMemoryReferenceStore::from_snapshot(common::snapshot());
    let (state, dispatcher) = ServerState::with_store(config, Arc::new(store)).unwrap();
    dispatcher.spawn();
    build_router(Arc::new(state))
}

fn post_json(uri: &str, body: Value, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn match_endpoint_resolves_and_sets_quota_headers() {
    let app = app(ServerConfig::default());

    let response = app
        .oneshot(post_json(
            "/api/v1/match",
            json!({ "query": "Côtes d'Armor" }),
            "198.51.100.1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-ratelimit-limit"], "60");
    assert_eq!(headers["x-ratelimit-remaining"], "59");
    assert!(headers.contains_key("x-ratelimit-reset"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "matched");
    assert_eq!(body["code"], "22");
    assert_eq!(body["type"], "departement");
    assert_eq!(body["source"], "database");
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
    let app = app(ServerConfig::default());
    let response = app
        .oneshot(post_json("/api/v1/match", json!({ "query": "  " }), "198.51.100.2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn quota_exhaustion_answers_429_with_retry_after() {
    let mut config = ServerConfig::default();
    config.admission.anonymous_per_minute = 2;
    let app = app(config);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/match", json!({ "query": "84" }), "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/match", json!({ "query": "84" }), "203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    // Quotas are per identity.
    let response = app
        .oneshot(post_json("/api/v1/match", json!({ "query": "84" }), "203.0.113.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let app = app(ServerConfig::default());
    let mut request = post_json("/api/v1/match", json!({ "query": "84" }), "198.51.100.3");
    request
        .headers_mut()
        .insert("x-api-key", "not-a-real-key".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_bad_keys_are_throttled() {
    let mut config = ServerConfig::default();
    config.admission.anonymous_per_minute = 3;
    let app = app(config);

    let attempt = |i: usize| {
        let mut request = post_json("/api/v1/match", json!({ "query": "84" }), "198.51.100.7");
        request
            .headers_mut()
            .insert("x-api-key", format!("guess-{i}").parse().unwrap());
        request
    };

    for i in 0..3 {
        let response = app.clone().oneshot(attempt(i)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.oneshot(attempt(3)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn health_routes_are_not_gated() {
    let mut config = ServerConfig::default();
    config.admission.anonymous_per_minute = 1;
    let app = app(config);

    for _ in 0..3 {
        let response = app.clone().oneshot(get("/health", "192.0.2.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.oneshot(get("/ready", "192.0.2.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let app = app(ServerConfig::default());
    let items: Vec<Value> = (0..1001).map(|i| json!({ "query": format!("q{i}") })).collect();

    let response = app
        .oneshot(post_json("/api/v1/batch", json!({ "items": items }), "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BATCH_TOO_LARGE");
}

#[tokio::test]
async fn batch_round_trip_over_http() {
    let app = app(ServerConfig::default());
    let ip = "198.51.100.5";

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/batch",
            json!({
                "items": [
                    { "query": "Lyon" },
                    { "query": "Par", "hints": { "departement": "79" } },
                    { "query": "Atlantide" }
                ],
                "clientId": "crm"
            }),
            ip,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = json_body(response).await;
    assert_eq!(accepted["totalItems"], 3);
    let results_url = accepted["resultsUrl"].as_str().unwrap().to_string();
    let status_url = accepted["statusUrl"].as_str().unwrap().to_string();

    let body = loop {
        let response = app.clone().oneshot(get(&results_url, ip)).await.unwrap();
        match response.status() {
            StatusCode::OK => break json_body(response).await,
            StatusCode::ACCEPTED => {
                assert!(response.headers().contains_key(header::RETRY_AFTER));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            other => panic!("unexpected status {other}"),
        }
    };

    assert_eq!(body["status"], "completed");
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["result"]["code"], "69123");
    assert_eq!(items[1]["result"]["code"], "79202");
    assert_eq!(items[2]["status"], "failed");

    let response = app.clone().oneshot(get(&status_url, ip)).await.unwrap();
    let status = json_body(response).await;
    assert_eq!(status["progress"], 100);

    let response = app
        .oneshot(get("/api/v1/batch?clientId=crm", ip))
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_batch_id_is_a_bad_request() {
    let app = app(ServerConfig::default());
    let response = app
        .oneshot(get("/api/v1/batch/not-a-uuid/results", "198.51.100.6"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
