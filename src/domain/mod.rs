//! Domain module
//!
//! Core domain types and business rules of the disbursement ledger.

pub mod amount;
pub mod context;
pub mod error;
pub mod models;
pub mod reference;

pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use models::{
    BankAccount, Disbursement, DisbursementStatus, NewDisbursement, User, Wallet,
    DEFAULT_CURRENCY, MAX_DESCRIPTION_LENGTH,
};
pub use reference::{Reference, ReferenceError, ReferenceGenerator, REFERENCE_PREFIX};
