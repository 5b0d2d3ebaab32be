//! Error handling module
//!
//! Centralized error types and HTTP response conversion.
//!
//! Every failure ends up in one JSON envelope:
//! `{"success": false, "message": "An error occurred", "error": "<reason>"}`.
//! Internal detail (store, settlement, invariant breaks) is logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Closed set of failure classes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InsufficientBalance,
    InternalError,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput | ErrorKind::InsufficientBalance => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("invalid JSON payload")]
    InvalidJson,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient wallet balance")]
    InsufficientBalance,

    #[error("user not found")]
    UserNotFound(i64),

    #[error("bank account not found")]
    BankAccountNotFound(i64),

    #[error("wallet not found")]
    WalletNotFound(i64),

    #[error("disbursement not found")]
    DisbursementNotFound(i64),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("disbursement settlement failed (reference {reference})")]
    SettlementFailed { reference: String, reason: String },

    #[error("request timed out")]
    Timeout,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds { .. } => AppError::InsufficientBalance,
            other => AppError::Store(other),
        }
    }
}

impl AppError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidJson | AppError::InvalidRequest(_) => ErrorKind::InvalidInput,
            AppError::InsufficientBalance => ErrorKind::InsufficientBalance,
            AppError::UserNotFound(_)
            | AppError::BankAccountNotFound(_)
            | AppError::WalletNotFound(_)
            | AppError::DisbursementNotFound(_) => ErrorKind::NotFound,
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
                DomainError::InvalidAmount(_) | DomainError::DescriptionTooLong { .. } => {
                    ErrorKind::InvalidInput
                }
                DomainError::InvalidTransition { .. } => ErrorKind::InternalError,
            },
            AppError::SettlementFailed { .. }
            | AppError::Timeout
            | AppError::Store(_)
            | AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Text safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::Domain(DomainError::InsufficientBalance { .. }) => {
                AppError::InsufficientBalance.to_string()
            }
            AppError::Domain(domain_err) if domain_err.is_client_error() => {
                format!("invalid request: {}", domain_err)
            }
            AppError::Domain(_) | AppError::Store(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        match &self {
            AppError::SettlementFailed { reference, reason } => {
                tracing::error!(reference = %reference, "Settlement failed: {}", reason);
            }
            _ if kind == ErrorKind::InternalError => {
                tracing::error!("Request failed: {:?}", self);
            }
            _ => {
                tracing::warn!("Request rejected: {}", self);
            }
        }

        let body = ErrorResponse {
            success: false,
            message: "An error occurred".to_string(),
            error: self.public_message(),
        };

        (kind.status_code(), Json(body)).into_response()
    }
}
