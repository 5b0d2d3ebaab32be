//! Wallet Disbursement Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod projection;
pub mod settlement;
pub mod store;

pub use config::{Config, StorageBackend};
pub use domain::{Amount, AmountError, Balance, DomainError, OperationContext};
pub use error::{AppError, AppResult, ErrorKind};
