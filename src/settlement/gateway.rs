//! Settlement Gateway
//!
//! The engine calls [`SettlementGateway::settle`] synchronously while its unit
//! of work is open. Implementations may be slow or fail; the engine bounds
//! the call with a timeout and resolves the disbursement either way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Amount, BankAccount};

/// What the rail needs to pay out one disbursement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub disbursement_id: i64,
    pub reference: String,
    pub amount: Amount,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

impl SettlementInstruction {
    pub fn new(
        disbursement_id: i64,
        reference: String,
        amount: Amount,
        currency: String,
        bank_account: &BankAccount,
    ) -> Self {
        Self {
            disbursement_id,
            reference,
            amount,
            currency,
            bank_name: bank_account.bank_name.clone(),
            account_number: bank_account.account_number.clone(),
            account_name: bank_account.account_name.clone(),
        }
    }
}

/// Confirmation returned by the rail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Identifier assigned by the rail
    pub external_id: String,
    pub settled_at: DateTime<Utc>,
}

/// Settlement failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement rejected: {0}")]
    Rejected(String),

    #[error("Settlement rail unavailable: {0}")]
    Unavailable(String),

    #[error("Settlement timed out after {0:?}")]
    TimedOut(Duration),
}

/// External capability that pays a disbursement out to a bank account
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<SettlementReceipt, SettlementError>;
}

/// Stand-in rail that confirms every instruction, optionally after a delay.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSettlementGateway {
    latency: Duration,
}

impl SimulatedSettlementGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl SettlementGateway for SimulatedSettlementGateway {
    async fn settle(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<SettlementReceipt, SettlementError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let receipt = SettlementReceipt {
            external_id: Uuid::new_v4().to_string(),
            settled_at: Utc::now(),
        };

        tracing::debug!(
            reference = %instruction.reference,
            amount = %instruction.amount,
            bank = %instruction.bank_name,
            external_id = %receipt.external_id,
            "Simulated settlement confirmed"
        );

        Ok(receipt)
    }
}
