//! Command Handlers module
//!
//! Command handlers that orchestrate business operations.
//! Each handler coordinates the entity store, the settlement gateway and
//! projections.

mod commands;
mod disbursement_handler;


pub use commands::*;
pub use disbursement_handler::{DisbursementHandler, DEFAULT_SETTLEMENT_TIMEOUT};
