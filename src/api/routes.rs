//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};
use crate::handlers::DisburseCommand;
use crate::projection::DisbursementView;

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Body of `POST /api/disbursements`
///
/// Fields are optional at the serde level so a missing field gets a
/// precise message instead of a generic decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct DisbursementRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub bank_account_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DisbursementRequest {
    pub fn into_command(self) -> AppResult<DisburseCommand> {
        let user_id = required_id(self.user_id, "user_id")?;
        let bank_account_id = required_id(self.bank_account_id, "bank_account_id")?;
        let amount = self
            .amount
            .ok_or_else(|| AppError::InvalidRequest("amount is required".to_string()))?;

        let command = DisburseCommand::new(user_id, bank_account_id, amount);
        Ok(match self.description {
            Some(description) => command.with_description(description),
            None => command,
        })
    }
}

fn required_id(value: Option<i64>, field: &str) -> AppResult<i64> {
    match value {
        Some(id) if id > 0 => Ok(id),
        Some(_) => Err(AppError::InvalidRequest(format!("{} must be positive", field))),
        None => Err(AppError::InvalidRequest(format!("{} is required", field))),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DisbursementResponse {
    pub success: bool,
    pub message: &'static str,
    pub disbursement: DisbursementView,
}

#[derive(Debug, Serialize)]
pub struct DisbursementListResponse {
    pub success: bool,
    pub message: &'static str,
    pub disbursements: Vec<DisbursementView>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/disbursements", post(create_disbursement))
        .route("/api/disbursements/:id", get(get_disbursement))
        .route(
            "/api/users/:user_id/disbursements",
            get(list_user_disbursements),
        )
}

// =========================================================================
// GET / and GET /health
// =========================================================================

async fn index() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "available",
        message: "Disbursement API is running",
    })
}

async fn health_check() -> &'static str {
    "OK"
}

// =========================================================================
// POST /api/disbursements
// =========================================================================

/// Disburse funds from a wallet to the owner's bank account
async fn create_disbursement(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<DisbursementRequest>, JsonRejection>,
) -> AppResult<Json<DisbursementResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(
            correlation_id = ?context.correlation_id,
            "Rejected disbursement body: {}",
            rejection
        );
        AppError::InvalidJson
    })?;

    let command = request.into_command()?;

    let disbursement = tokio::time::timeout(
        state.request_timeout,
        state.disbursements.execute(command, &context),
    )
    .await
    .map_err(|_| {
        tracing::warn!(
            correlation_id = ?context.correlation_id,
            timeout_ms = state.request_timeout.as_millis() as u64,
            "Disbursement request timed out, unit rolled back"
        );
        AppError::Timeout
    })??;

    Ok(Json(DisbursementResponse {
        success: true,
        message: "Disbursement processed successfully",
        disbursement,
    }))
}

// =========================================================================
// GET /api/disbursements/:id
// =========================================================================

async fn get_disbursement(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DisbursementResponse>> {
    let Path(id) = id.map_err(|_| AppError::InvalidRequest("invalid disbursement id".to_string()))?;

    let disbursement = state.projection.disbursement(id).await?;

    Ok(Json(DisbursementResponse {
        success: true,
        message: "Disbursement retrieved successfully",
        disbursement,
    }))
}

// =========================================================================
// GET /api/users/:user_id/disbursements
// =========================================================================

async fn list_user_disbursements(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DisbursementListResponse>> {
    let Path(user_id) =
        user_id.map_err(|_| AppError::InvalidRequest("invalid user id".to_string()))?;

    let disbursements = state.projection.user_disbursements(user_id).await?;

    Ok(Json(DisbursementListResponse {
        success: true,
        message: "Disbursements retrieved successfully",
        disbursements,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disbursement_request_deserialize() {
        let json = r#"{
            "user_id": 1,
            "bank_account_id": 1,
            "amount": 1000000,
            "description": "Monthly payout"
        }"#;

        let request: DisbursementRequest = serde_json::from_str(json).unwrap();
        let command = request.into_command().unwrap();
        assert_eq!(command.user_id, 1);
        assert_eq!(command.amount, 1_000_000);
        assert_eq!(command.description, Some("Monthly payout".to_string()));
    }

    #[test]
    fn test_missing_fields_are_named() {
        let request: DisbursementRequest =
            serde_json::from_str(r#"{"user_id": 1, "amount": 10}"#).unwrap();

        match request.into_command() {
            Err(AppError::InvalidRequest(msg)) => assert_eq!(msg, "bank_account_id is required"),
            other => panic!("Expected InvalidRequest, got: {:?}", other),
        }

        let request: DisbursementRequest =
            serde_json::from_str(r#"{"user_id": 1, "bank_account_id": 1}"#).unwrap();
        assert!(matches!(
            request.into_command(),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_non_positive_ids_rejected() {
        let request = DisbursementRequest {
            user_id: Some(0),
            bank_account_id: Some(1),
            amount: Some(10),
            description: None,
        };
        match request.into_command() {
            Err(AppError::InvalidRequest(msg)) => assert_eq!(msg, "user_id must be positive"),
            other => panic!("Expected InvalidRequest, got: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_types_fail_to_decode() {
        let result: Result<DisbursementRequest, _> =
            serde_json::from_str(r#"{"user_id": "one", "bank_account_id": 1, "amount": 10}"#);
        assert!(result.is_err());
    }
}
