//! Projection Service
//!
//! Read side: turns committed disbursement rows into response views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{Disbursement, DisbursementStatus};
use crate::error::{AppError, AppResult};
use crate::store::EntityStore;

/// Disbursement as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementView {
    pub id: i64,
    pub user_id: i64,
    pub wallet_id: i64,
    pub bank_account_id: i64,
    pub amount: i64,
    pub status: DisbursementStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Disbursement> for DisbursementView {
    fn from(record: Disbursement) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            wallet_id: record.wallet_id,
            bank_account_id: record.bank_account_id,
            amount: record.amount,
            status: record.status,
            reference: record.reference,
            created_at: record.created_at,
            updated_at: record.updated_at,
            completed_at: record.completed_at,
        }
    }
}

/// Projection Service for reading committed disbursements
#[derive(Clone)]
pub struct ProjectionService {
    store: Arc<dyn EntityStore>,
}

impl ProjectionService {
    /// Create a new ProjectionService
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Read back one finalized disbursement.
    pub async fn disbursement(&self, id: i64) -> AppResult<DisbursementView> {
        let record = self
            .store
            .get_disbursement(id)
            .await?
            .ok_or(AppError::DisbursementNotFound(id))?;

        Ok(record.into())
    }

    /// Disbursement history of a user, newest first.
    pub async fn user_disbursements(&self, user_id: i64) -> AppResult<Vec<DisbursementView>> {
        let records = self.store.disbursements_for_user(user_id).await?;
        Ok(records.into_iter().map(DisbursementView::from).collect())
    }
}
