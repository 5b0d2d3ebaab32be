//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::models::DisbursementStatus;
use super::AmountError;

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero or negative)
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Description longer than the column allows
    #[error("description must be at most {max} characters (got {length})")]
    DescriptionTooLong { length: usize, max: usize },

    /// Insufficient balance for debit operation
    #[error("insufficient wallet balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    /// Disbursement status change not allowed by the lifecycle
    #[error("illegal disbursement transition from {from} to {to}")]
    InvalidTransition {
        from: DisbursementStatus,
        to: DisbursementStatus,
    },
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(required: i64, available: i64) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_) | Self::DescriptionTooLong { .. } | Self::InsufficientBalance { .. }
        )
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_error() {
        let err = DomainError::insufficient_balance(9_000_000, 5_000_000);

        assert!(err.is_client_error());
        assert!(err.to_string().contains("9000000"));
        assert!(err.to_string().contains("5000000"));
    }

    #[test]
    fn test_amount_error_conversion() {
        let err: DomainError = AmountError::NotPositive(0).into();
        assert!(matches!(err, DomainError::InvalidAmount(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_invalid_transition_is_not_client_error() {
        let err = DomainError::InvalidTransition {
            from: DisbursementStatus::Completed,
            to: DisbursementStatus::Failed,
        };

        assert!(!err.is_client_error());
        assert_eq!(
            err.to_string(),
            "illegal disbursement transition from completed to failed"
        );
    }
}
