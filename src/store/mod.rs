//! Entity Store module
//!
//! Persistence layer for users, bank accounts, wallets and disbursements.
//! All writes happen inside a [`UnitOfWork`]: either every staged effect
//! becomes visible at [`UnitOfWork::commit`], or none does. Dropping a unit
//! without committing rolls it back and releases its wallet locks.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Amount, BankAccount, Disbursement, DisbursementStatus, NewDisbursement, User, Wallet,
};

pub use error::StoreError;
pub use memory::{InMemoryEntityStore, InMemoryUnitOfWork};
pub use postgres::{PgEntityStore, PgUnitOfWork};

/// Durable entity tables with transactional access
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Open a new atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Read a committed disbursement.
    async fn get_disbursement(&self, id: i64) -> Result<Option<Disbursement>, StoreError>;

    /// Read the committed wallet of a user.
    async fn wallet_by_owner(&self, user_id: i64) -> Result<Option<Wallet>, StoreError>;

    /// Committed disbursements of a user, newest first.
    async fn disbursements_for_user(&self, user_id: i64) -> Result<Vec<Disbursement>, StoreError>;
}

/// One all-or-nothing group of reads and writes
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError>;

    /// Returns `None` both when the account is missing and when it belongs to
    /// someone other than `expected_owner_id`.
    async fn find_bank_account(
        &mut self,
        id: i64,
        expected_owner_id: i64,
    ) -> Result<Option<BankAccount>, StoreError>;

    /// Locks the wallet row until the unit ends.
    async fn find_wallet_by_owner(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError>;

    /// Next disbursement id. Reserved ids are never reused, even on rollback.
    async fn reserve_disbursement_id(&mut self) -> Result<i64, StoreError>;

    async fn insert_disbursement(&mut self, record: &NewDisbursement) -> Result<i64, StoreError>;

    /// Returns the new balance. Fails with [`StoreError::InsufficientFunds`]
    /// instead of going negative.
    async fn debit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn credit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Only pending records can change; finalized ones are rejected.
    async fn update_disbursement_status(
        &mut self,
        id: i64,
        status: DisbursementStatus,
        completed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
