//! Ledger entities
//!
//! Users, bank accounts, wallets and disbursements as held by the engine
//! for the duration of one unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, DomainError};

/// Default currency for new wallets
pub const DEFAULT_CURRENCY: &str = "IDR";

/// Maximum description length in characters
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// A user owning bank accounts and one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External payout destination owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub user_id: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankAccount {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Balance ledger of one user, in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Check the balance covers `amount` without mutating anything.
    pub fn ensure_can_debit(&self, amount: &Amount) -> Result<(), DomainError> {
        if self.balance < amount.value() {
            return Err(DomainError::insufficient_balance(amount.value(), self.balance));
        }
        Ok(())
    }
}

/// Disbursement lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Pending,
    Completed,
    Failed,
}

impl DisbursementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementStatus::Pending => "pending",
            DisbursementStatus::Completed => "completed",
            DisbursementStatus::Failed => "failed",
        }
    }

    /// Completed and failed records are immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisbursementStatus::Pending)
    }

    pub fn can_transition_to(&self, next: DisbursementStatus) -> bool {
        matches!(
            (self, next),
            (DisbursementStatus::Pending, DisbursementStatus::Completed)
                | (DisbursementStatus::Pending, DisbursementStatus::Failed)
        )
    }
}

impl fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisbursementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DisbursementStatus::Pending),
            "completed" => Ok(DisbursementStatus::Completed),
            "failed" => Ok(DisbursementStatus::Failed),
            other => Err(format!("unknown disbursement status '{}'", other)),
        }
    }
}

/// A recorded transfer from a wallet to a bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: i64,
    pub user_id: i64,
    pub wallet_id: i64,
    pub bank_account_id: i64,
    pub amount: i64,
    pub status: DisbursementStatus,
    pub reference: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Disbursement {
    /// Move to `completed`, stamping the completion time.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(DisbursementStatus::Completed, at)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Move to `failed`. `completed_at` stays empty.
    pub fn fail(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(DisbursementStatus::Failed, at)
    }

    fn transition(&mut self, next: DisbursementStatus, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

/// Row staged for insertion, always starting out `pending`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDisbursement {
    pub id: i64,
    pub user_id: i64,
    pub wallet_id: i64,
    pub bank_account_id: i64,
    pub amount: Amount,
    pub reference: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewDisbursement {
    /// The record as it exists right after insertion.
    pub fn into_pending(self) -> Disbursement {
        Disbursement {
            id: self.id,
            user_id: self.user_id,
            wallet_id: self.wallet_id,
            bank_account_id: self.bank_account_id,
            amount: self.amount.value(),
            status: DisbursementStatus::Pending,
            reference: self.reference,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.created_at,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64) -> Wallet {
        let now = Utc::now();
        Wallet {
            id: 1,
            user_id: 1,
            balance,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn pending() -> Disbursement {
        NewDisbursement {
            id: 7,
            user_id: 1,
            wallet_id: 1,
            bank_account_id: 1,
            amount: Amount::new(1_000_000).unwrap(),
            reference: "DSB-1700000000-1-7".to_string(),
            description: None,
            created_at: Utc::now(),
        }
        .into_pending()
    }

    #[test]
    fn test_wallet_sufficient_balance() {
        assert!(wallet(5_000_000)
            .ensure_can_debit(&Amount::new(5_000_000).unwrap())
            .is_ok());
    }

    #[test]
    fn test_wallet_insufficient_balance() {
        let result = wallet(5_000_000).ensure_can_debit(&Amount::new(9_000_000).unwrap());
        assert_eq!(
            result,
            Err(DomainError::InsufficientBalance {
                required: 9_000_000,
                available: 5_000_000
            })
        );
    }

    #[test]
    fn test_large_wallet_can_debit() {
        let rich = wallet(5_000_000_000_000_000);
        assert!(rich
            .ensure_can_debit(&Amount::new(2_000_000_000_000_000).unwrap())
            .is_ok());
        assert!(rich.ensure_can_debit(&Amount::new(i64::MAX).unwrap()).is_err());
    }

    #[test]
    fn test_bank_account_ownership() {
        let now = Utc::now();
        let account = BankAccount {
            id: 3,
            user_id: 2,
            bank_name: "Mandiri".to_string(),
            account_number: "0987654321".to_string(),
            account_name: "Jane Smith".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(account.is_owned_by(2));
        assert!(!account.is_owned_by(1));
    }

    #[test]
    fn test_new_disbursement_starts_pending() {
        let record = pending();
        assert_eq!(record.status, DisbursementStatus::Pending);
        assert_eq!(record.amount, 1_000_000);
        assert_eq!(record.updated_at, record.created_at);
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_complete_sets_completed_at() {
        let mut record = pending();
        let at = Utc::now();
        record.complete(at).unwrap();

        assert_eq!(record.status, DisbursementStatus::Completed);
        assert_eq!(record.completed_at, Some(at));
        assert_eq!(record.updated_at, at);
    }

    #[test]
    fn test_fail_leaves_completed_at_empty() {
        let mut record = pending();
        record.fail(Utc::now()).unwrap();

        assert_eq!(record.status, DisbursementStatus::Failed);
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let mut record = pending();
        record.complete(Utc::now()).unwrap();

        assert!(matches!(
            record.fail(Utc::now()),
            Err(DomainError::InvalidTransition {
                from: DisbursementStatus::Completed,
                to: DisbursementStatus::Failed
            })
        ));
        assert!(record.complete(Utc::now()).is_err());
    }

    #[test]
    fn test_status_round_trip_and_serde() {
        for status in [
            DisbursementStatus::Pending,
            DisbursementStatus::Completed,
            DisbursementStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DisbursementStatus>(), Ok(status));
        }
        assert!("settled".parse::<DisbursementStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&DisbursementStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_pending_is_not_terminal() {
        assert!(!DisbursementStatus::Pending.is_terminal());
        assert!(DisbursementStatus::Completed.is_terminal());
        assert!(DisbursementStatus::Failed.is_terminal());
        assert!(!DisbursementStatus::Failed.can_transition_to(DisbursementStatus::Pending));
    }
}
