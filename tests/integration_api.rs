//! API Integration Tests
//!
//! Drive the full router (middleware included) over the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use wallet_disbursement::settlement::{
    SettlementError, SettlementGateway, SettlementInstruction, SettlementReceipt,
};
use wallet_disbursement::store::EntityStore;

mod common;

fn post_disbursement(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/disbursements")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    read_json(response).await
}

async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn assert_error_envelope(body: &Value, error: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "An error occurred");
    assert_eq!(body["error"], error);
}

#[tokio::test]
async fn test_index_and_health() {
    let (_, app) = common::memory_app().await;

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "available", "message": "Disbursement API is running"})
    );

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_disbursement_e2e() {
    let (store, app) = common::memory_app().await;

    // 1. Disburse
    let (status, body) = send(
        &app,
        post_disbursement(json!({
            "user_id": 1,
            "bank_account_id": 1,
            "amount": 1_000_000,
            "description": "Monthly payout"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "Disbursement failed: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Disbursement processed successfully");

    let disbursement = &body["disbursement"];
    assert_eq!(disbursement["user_id"], 1);
    assert_eq!(disbursement["bank_account_id"], 1);
    assert_eq!(disbursement["amount"], 1_000_000);
    assert_eq!(disbursement["status"], "completed");
    assert!(disbursement["completed_at"].is_string());
    assert!(disbursement["reference"]
        .as_str()
        .unwrap()
        .starts_with("DSB-"));
    assert!(disbursement.get("description").is_none());

    let wallet = store.wallet_by_owner(1).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 4_000_000);

    // 2. Read it back
    let id = disbursement["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/api/disbursements/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["message"], "Disbursement retrieved successfully");
    assert_eq!(fetched["disbursement"], *disbursement);

    // 3. History
    let (status, history) = send(&app, get("/api/users/1/disbursements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["message"], "Disbursements retrieved successfully");
    assert_eq!(history["disbursements"].as_array().unwrap().len(), 1);

    let (_, other) = send(&app, get("/api/users/2/disbursements")).await;
    assert!(other["disbursements"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_insufficient_balance_is_400() {
    let (store, app) = common::memory_app().await;

    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 1, "bank_account_id": 1, "amount": 9_000_000})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "insufficient wallet balance");
    assert_eq!(
        store.wallet_by_owner(1).await.unwrap().unwrap().balance,
        5_000_000
    );
}

#[tokio::test]
async fn test_not_found_cases() {
    let (_, app) = common::memory_app().await;

    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 99, "bank_account_id": 1, "amount": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "user not found");

    // Bank account of another user
    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 1, "bank_account_id": 2, "amount": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "bank account not found");

    let (status, body) = send(&app, get("/api/disbursements/404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "disbursement not found");
}

#[tokio::test]
async fn test_malformed_requests_are_400() {
    let (_, app) = common::memory_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/disbursements")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid JSON payload");

    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 1, "bank_account_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid request: amount is required");

    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 1, "bank_account_id": 1, "amount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        post_disbursement(json!({
            "user_id": 1,
            "bank_account_id": 1,
            "amount": 10,
            "description": "x".repeat(256)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&app, get("/api/disbursements/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid request: invalid disbursement id");
}

struct DownGateway;

#[async_trait]
impl SettlementGateway for DownGateway {
    async fn settle(
        &self,
        _instruction: &SettlementInstruction,
    ) -> Result<SettlementReceipt, SettlementError> {
        Err(SettlementError::Unavailable("bank offline".to_string()))
    }
}

#[tokio::test]
async fn test_settlement_failure_is_500_and_restores_balance() {
    let (store, app) = common::memory_app_with_gateway(Arc::new(DownGateway)).await;

    let (status, body) = send(
        &app,
        post_disbursement(json!({"user_id": 3, "bank_account_id": 3, "amount": 500_000})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("disbursement settlement failed"));
    assert!(!error.contains("bank offline"), "internal detail leaked");

    assert_eq!(
        store.wallet_by_owner(3).await.unwrap().unwrap().balance,
        7_500_000
    );
    let (_, history) = send(&app, get("/api/users/3/disbursements")).await;
    assert_eq!(history["disbursements"][0]["status"], "failed");
}

#[tokio::test]
async fn test_correlation_id_is_echoed_or_generated() {
    let (_, app) = common::memory_app().await;

    let id = Uuid::new_v4();
    let request = Request::builder()
        .uri("/")
        .header("X-Correlation-Id", id.to_string())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()["x-correlation-id"].to_str().unwrap(),
        id.to_string()
    );

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    let generated = response.headers()["x-correlation-id"].to_str().unwrap();
    assert!(Uuid::parse_str(generated).is_ok());
}
