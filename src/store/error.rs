//! Entity Store Errors
//!
//! Error types for store operations.

/// Errors that can occur in the entity store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Debit would drive the wallet balance negative
    #[error("Insufficient funds in wallet {wallet_id}: requested {requested}")]
    InsufficientFunds { wallet_id: i64, requested: i64 },

    /// Row addressed by id does not exist
    #[error("{table} row not found: {id}")]
    RowNotFound { table: &'static str, id: i64 },

    /// Status change attempted on a completed or failed disbursement
    #[error("Disbursement {0} is already finalized")]
    AlreadyFinalized(i64),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Store cannot serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
