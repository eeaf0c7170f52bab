// ABOUTME: HTTP integration tests for the Parley router driven through tower oneshot requests
// ABOUTME: Covers auth gating, envelopes, status mapping, ownership, search routes and rate limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use common::{
    FailingEmbedder, KeyedEmbedder, VocabularyEmbedder, ALICE_TOKEN, BOB_TOKEN, EXPIRED_TOKEN,
};
use helpers::axum_test::AxumTestRequest;
use parley_server::{
    config::{RateLimitRule, ServerConfig},
    embeddings::EmbeddingProvider,
    errors::AppResult,
    server::build_router,
};
use serde_json::{json, Value};

async fn app_with(embeddings: Arc<dyn EmbeddingProvider>) -> Router {
    let resources = common::create_test_resources(embeddings).await.unwrap();
    build_router(&resources)
}

async fn app() -> Router {
    app_with(Arc::new(VocabularyEmbedder::new(64))).await
}

async fn create_conversation(app: &Router, token: &str, title: &str) -> String {
    let body: Value = AxumTestRequest::post("/chat/conversations")
        .bearer(token)
        .json(&json!({ "title": title }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    body["data"]["id"].as_str().unwrap().to_owned()
}

async fn post_message(app: &Router, token: &str, conversation_id: &str, body: &Value) -> u16 {
    AxumTestRequest::post(&format!("/chat/conversations/{conversation_id}/messages"))
        .bearer(token)
        .json(body)
        .send(app.clone())
        .await
        .status()
}

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_and_ready_need_no_credentials() {
    let app = app().await;

    let health: Value = AxumTestRequest::get("/health")
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "parley-server");

    let ready: Value = AxumTestRequest::get("/ready")
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(ready["status"], "ready");
}

#[tokio::test]
async fn test_missing_credentials_are_unauthorized() {
    let app = app().await;

    let body: Value = AxumTestRequest::get("/chat/conversations")
        .send(app.clone())
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .json();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    AxumTestRequest::get("/auth/me")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send(app)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_tokens_are_forbidden() {
    let app = app().await;

    let invalid: Value = AxumTestRequest::get("/chat/conversations")
        .bearer("not-a-real-token")
        .send(app.clone())
        .await
        .assert_status(StatusCode::FORBIDDEN)
        .json();
    assert_eq!(invalid["success"], false);

    AxumTestRequest::get("/chat/conversations")
        .bearer(EXPIRED_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_me_returns_synced_identity() {
    let app = app().await;

    let me: Value = AxumTestRequest::get("/auth/me")
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(
        me,
        json!({ "user": { "uid": "alice", "email": "alice@example.com", "name": "ALICE" } })
    );
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = app().await;

    let response = AxumTestRequest::get("/health").send(app.clone()).await;
    let generated = response.header("x-request-id").unwrap();
    assert!(generated.starts_with("req_"));

    let echoed = AxumTestRequest::get("/health")
        .header("x-request-id", "client-chosen-id")
        .send(app)
        .await;
    assert_eq!(echoed.header("x-request-id"), Some("client-chosen-id"));
}

// ============================================================================
// Conversations and messages
// ============================================================================

#[tokio::test]
async fn test_conversation_lifecycle_over_http() {
    let app = app().await;
    let id = create_conversation(&app, ALICE_TOKEN, "Trip Planning").await;

    let listed: Value = AxumTestRequest::get("/chat/conversations")
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(listed["success"], true);
    assert_eq!(listed["data"][0]["id"], id.as_str());
    assert_eq!(listed["data"][0]["title"], "Trip Planning");
    assert_eq!(listed["data"][0]["is_archived"], false);

    let created: Value = AxumTestRequest::post(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .json(&json!({
            "content": "Consider Kyoto in spring.",
            "messageType": "assistant",
            "modelUsed": "gpt-4"
        }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let message = &created["data"];
    assert_eq!(message["message_type"], "assistant");
    assert_eq!(message["model_used"], "gpt-4");
    assert_eq!(message["token_count"], 7);
    assert!(message.get("embedding").is_none());
    assert!(message.get("content_embedding").is_none());

    let messages: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(messages["data"].as_array().unwrap().len(), 1);
    assert_eq!(messages["data"][0]["content"], "Consider Kyoto in spring.");

    let fetched: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}"))
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(fetched["data"]["updated_at"], message["created_at"]);
}

#[tokio::test]
async fn test_message_type_defaults_to_user_and_is_validated() {
    let app = app().await;
    let id = create_conversation(&app, ALICE_TOKEN, "Defaults").await;

    let created: Value = AxumTestRequest::post(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .json(&json!({ "content": "hello" }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    assert_eq!(created["data"]["message_type"], "user");

    let status = post_message(
        &app,
        ALICE_TOKEN,
        &id,
        &json!({ "content": "hello", "messageType": "robot" }),
    )
    .await;
    assert_eq!(status, 400);

    let status = post_message(&app, ALICE_TOKEN, &id, &json!({ "content": "   " })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_other_users_conversations_are_not_found() {
    let app = app().await;
    let id = create_conversation(&app, ALICE_TOKEN, "Private").await;

    let body: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}"))
        .bearer(BOB_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .json();
    assert_eq!(body["success"], false);

    let status = post_message(&app, BOB_TOKEN, &id, &json!({ "content": "intrusion" })).await;
    assert_eq!(status, 404);

    let messages: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}/messages"))
        .bearer(BOB_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(messages["data"], json!([]));

    let bobs: Value = AxumTestRequest::get("/chat/conversations")
        .bearer(BOB_TOKEN)
        .send(app)
        .await
        .json();
    assert_eq!(bobs["data"], json!([]));
}

#[tokio::test]
async fn test_malformed_ids_and_paging_are_bad_requests() {
    let app = app().await;

    AxumTestRequest::get("/chat/conversations/not-a-uuid")
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::get("/chat/conversations?limit=0")
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::get("/chat/conversations?limit=abc")
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4();
    AxumTestRequest::get(&format!("/chat/conversations/{unknown}"))
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_archive_with_and_without_body() {
    let app = app().await;
    let id = create_conversation(&app, ALICE_TOKEN, "Old").await;

    let archived: Value = AxumTestRequest::post(&format!("/chat/conversations/{id}/archive"))
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(archived["data"]["is_archived"], true);

    let listed: Value = AxumTestRequest::get("/chat/conversations")
        .bearer(ALICE_TOKEN)
        .send(app.clone())
        .await
        .json();
    assert_eq!(listed["data"], json!([]));

    let restored: Value = AxumTestRequest::post(&format!("/chat/conversations/{id}/archive"))
        .bearer(ALICE_TOKEN)
        .json(&json!({ "archived": false }))
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(restored["data"]["is_archived"], false);
}

#[tokio::test]
async fn test_embedding_outage_is_bad_gateway_and_stores_nothing() {
    let app = app_with(Arc::new(FailingEmbedder)).await;
    let id = create_conversation(&app, ALICE_TOKEN, "Outage").await;

    let status = post_message(&app, ALICE_TOKEN, &id, &json!({ "content": "hello" })).await;
    assert_eq!(status, 502);

    let messages: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .json();
    assert_eq!(messages["data"], json!([]));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_routes_share_the_envelope_and_scope() {
    let embedder = KeyedEmbedder::new(vec![0.0, 0.0, 1.0])
        .with("probe", vec![1.0, 0.0, 0.0])
        .with("close", vec![0.9, 0.43589, 0.0])
        .with("middle", vec![0.6, 0.8, 0.0]);
    let app = app_with(Arc::new(embedder)).await;
    let mine = create_conversation(&app, ALICE_TOKEN, "Mine").await;
    let theirs = create_conversation(&app, BOB_TOKEN, "Theirs").await;
    assert_eq!(post_message(&app, ALICE_TOKEN, &mine, &json!({ "content": "close" })).await, 201);
    assert_eq!(post_message(&app, ALICE_TOKEN, &mine, &json!({ "content": "middle" })).await, 201);
    assert_eq!(post_message(&app, BOB_TOKEN, &theirs, &json!({ "content": "probe" })).await, 201);

    for path in ["/search/messages", "/chat/search"] {
        let results: Value = AxumTestRequest::post(path)
            .bearer(ALICE_TOKEN)
            .json(&json!({ "query": "probe" }))
            .send(app.clone())
            .await
            .assert_status(StatusCode::OK)
            .json();
        assert_eq!(results["success"], true);
        let contents: Vec<&str> = results["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|hit| hit["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["close", "middle"], "{path}");
        assert!(results["data"][0]["similarity"].as_f64().unwrap() > 0.89);
    }

    let scoped: Value = AxumTestRequest::post("/search/messages")
        .bearer(ALICE_TOKEN)
        .json(&json!({ "query": "probe", "conversationId": theirs }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(scoped["data"], json!([]));

    let similar: Value = AxumTestRequest::post("/search/similar")
        .bearer(ALICE_TOKEN)
        .json(&json!({ "query": "probe" }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(similar["data"].as_array().unwrap().len(), 1);

    let loose: Value = AxumTestRequest::post("/search/similar")
        .bearer(ALICE_TOKEN)
        .json(&json!({ "query": "probe", "threshold": 0.1, "limit": 1 }))
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(loose["data"][0]["content"], "close");
    assert_eq!(loose["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_rejects_bad_input() {
    let app = app().await;

    AxumTestRequest::post("/search/messages")
        .bearer(ALICE_TOKEN)
        .json(&json!({ "query": "" }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post("/search/messages")
        .bearer(ALICE_TOKEN)
        .json(&json!({ "query": "kyoto", "limit": 51 }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post("/search/similar")
        .bearer(ALICE_TOKEN)
        .header("content-type", "application/json")
        .send(app)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_message_creation_has_its_own_limit() {
    let mut config = ServerConfig::default();
    config.rate_limit.chat = RateLimitRule {
        max_requests: 2,
        window_secs: 60,
    };
    let resources = common::create_test_resources_with_config(
        Arc::new(VocabularyEmbedder::new(64)),
        config,
    )
    .await
    .unwrap();
    let app = build_router(&resources);
    let id = create_conversation(&app, ALICE_TOKEN, "Chatty").await;

    for _ in 0..2 {
        assert_eq!(post_message(&app, ALICE_TOKEN, &id, &json!({ "content": "hi" })).await, 201);
    }

    let limited = AxumTestRequest::post(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .json(&json!({ "content": "hi" }))
        .send(app.clone())
        .await;
    assert_eq!(limited.status(), 429);
    assert!(limited.header("retry-after").is_some());
    let body: Value = limited.json();
    assert_eq!(body["success"], false);

    // Reads are not affected by the message limit
    AxumTestRequest::get(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_general_limit_covers_api_but_not_health() {
    let mut config = ServerConfig::default();
    config.rate_limit.api = RateLimitRule {
        max_requests: 3,
        window_secs: 900,
    };
    let resources = common::create_test_resources_with_config(
        Arc::new(VocabularyEmbedder::new(64)),
        config,
    )
    .await
    .unwrap();
    let app = build_router(&resources);

    for remaining in ["2", "1", "0"] {
        let response = AxumTestRequest::get("/chat/conversations")
            .bearer(ALICE_TOKEN)
            .send(app.clone())
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.header("x-ratelimit-limit"), Some("3"));
        assert_eq!(response.header("x-ratelimit-remaining"), Some(remaining));
    }

    // Unauthenticated requests count against the same window
    AxumTestRequest::get("/chat/conversations")
        .send(app.clone())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    AxumTestRequest::get("/health")
        .send(app)
        .await
        .assert_status(StatusCode::OK);
}

async fn app_with_api_limit(max_requests: u32, trust_proxy_headers: bool) -> Router {
    let mut config = ServerConfig::default();
    config.rate_limit.api = RateLimitRule {
        max_requests,
        window_secs: 900,
    };
    config.rate_limit.trust_proxy_headers = trust_proxy_headers;
    let resources = common::create_test_resources_with_config(
        Arc::new(VocabularyEmbedder::new(64)),
        config,
    )
    .await
    .unwrap();
    build_router(&resources)
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_the_limit() {
    let app = app_with_api_limit(1, false).await;

    let mut statuses = Vec::new();
    for i in 0..5 {
        let response = AxumTestRequest::get("/chat/conversations")
            .bearer(ALICE_TOKEN)
            .header("x-forwarded-for", &format!("198.51.100.{i}"))
            .send(app.clone())
            .await;
        statuses.push(response.status());
    }
    assert_eq!(statuses, vec![200, 429, 429, 429, 429]);
}

#[tokio::test]
async fn test_forwarded_for_keys_clients_behind_trusted_proxy() {
    let app = app_with_api_limit(1, true).await;

    for i in 0..3 {
        AxumTestRequest::get("/chat/conversations")
            .bearer(ALICE_TOKEN)
            .header("x-forwarded-for", &format!("198.51.100.{i}"))
            .send(app.clone())
            .await
            .assert_status(StatusCode::OK);
    }

    AxumTestRequest::get("/chat/conversations")
        .bearer(ALICE_TOKEN)
        .header("x-forwarded-for", "198.51.100.0")
        .send(app)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

// ============================================================================
// Timeouts
// ============================================================================

/// Embedder that answers only after the request budget has run out
struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }

    fn model(&self) -> &str {
        "stalled-test"
    }

    fn dimensions(&self) -> usize {
        3
    }
}

#[tokio::test]
async fn test_timed_out_request_uses_error_envelope() {
    let config = ServerConfig {
        request_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let resources = common::create_test_resources_with_config(Arc::new(StalledEmbedder), config)
        .await
        .unwrap();
    let app = build_router(&resources);
    let id = create_conversation(&app, ALICE_TOKEN, "Slow").await;

    let body: Value = AxumTestRequest::post(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .json(&json!({ "content": "hello" }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::REQUEST_TIMEOUT)
        .json();
    assert_eq!(body, json!({ "success": false, "error": "Request timed out after 1s" }));

    // The abandoned append left nothing behind
    let messages: Value = AxumTestRequest::get(&format!("/chat/conversations/{id}/messages"))
        .bearer(ALICE_TOKEN)
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(messages["data"], json!([]));
}
