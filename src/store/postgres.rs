//! PostgreSQL Entity Store
//!
//! A unit of work is one database transaction. The wallet row is locked with
//! `SELECT ... FOR UPDATE` on first read, so concurrent disbursements against
//! the same wallet serialize while different wallets proceed in parallel.
//! Dropping an uncommitted `sqlx::Transaction` rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    Amount, BankAccount, Disbursement, DisbursementStatus, NewDisbursement, User, Wallet,
};

use super::{EntityStore, StoreError, UnitOfWork};

type UserRow = (i64, String, String, DateTime<Utc>, DateTime<Utc>);
type BankAccountRow = (i64, i64, String, String, String, DateTime<Utc>, DateTime<Utc>);
type WalletRow = (i64, i64, i64, String, DateTime<Utc>, DateTime<Utc>);
type DisbursementRow = (
    i64,
    i64,
    i64,
    i64,
    i64,
    String,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const WALLET_COLUMNS: &str = "id, user_id, balance, currency, created_at, updated_at";
const DISBURSEMENT_COLUMNS: &str = "id, user_id, wallet_id, bank_account_id, amount, status, \
     reference, description, created_at, updated_at, completed_at";

/// Postgres error code for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

fn user_from_row((id, name, email, created_at, updated_at): UserRow) -> User {
    User {
        id,
        name,
        email,
        created_at,
        updated_at,
    }
}

fn bank_account_from_row(
    (id, user_id, bank_name, account_number, account_name, created_at, updated_at): BankAccountRow,
) -> BankAccount {
    BankAccount {
        id,
        user_id,
        bank_name,
        account_number,
        account_name,
        created_at,
        updated_at,
    }
}

fn wallet_from_row((id, user_id, balance, currency, created_at, updated_at): WalletRow) -> Wallet {
    Wallet {
        id,
        user_id,
        balance,
        currency,
        created_at,
        updated_at,
    }
}

fn disbursement_from_row(row: DisbursementRow) -> Result<Disbursement, StoreError> {
    let (
        id,
        user_id,
        wallet_id,
        bank_account_id,
        amount,
        status,
        reference,
        description,
        created_at,
        updated_at,
        completed_at,
    ) = row;

    let status: DisbursementStatus = status
        .parse()
        .map_err(|e: String| StoreError::Corrupt(format!("disbursement {}: {}", id, e)))?;

    Ok(Disbursement {
        id,
        user_id,
        wallet_id,
        bank_account_id,
        amount,
        status,
        reference,
        description,
        created_at,
        updated_at,
        completed_at,
    })
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    let is_unique_violation = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if is_unique_violation {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Database(err)
    }
}

/// Entity store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    /// Create a new PgEntityStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn get_disbursement(&self, id: i64) -> Result<Option<Disbursement>, StoreError> {
        let sql = format!("SELECT {} FROM disbursements WHERE id = $1", DISBURSEMENT_COLUMNS);
        let row: Option<DisbursementRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(disbursement_from_row).transpose()
    }

    async fn wallet_by_owner(&self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        let sql = format!("SELECT {} FROM wallets WHERE user_id = $1", WALLET_COLUMNS);
        let row: Option<WalletRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(wallet_from_row))
    }

    async fn disbursements_for_user(&self, user_id: i64) -> Result<Vec<Disbursement>, StoreError> {
        let sql = format!(
            "SELECT {} FROM disbursements WHERE user_id = $1 ORDER BY id DESC",
            DISBURSEMENT_COLUMNS
        );
        let rows: Vec<DisbursementRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(disbursement_from_row).collect()
    }
}

/// One PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn find_bank_account(
        &mut self,
        id: i64,
        expected_owner_id: i64,
    ) -> Result<Option<BankAccount>, StoreError> {
        let row: Option<BankAccountRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, bank_name, account_number, account_name, created_at, updated_at
            FROM bank_accounts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(expected_owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(bank_account_from_row))
    }

    async fn find_wallet_by_owner(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        let sql = format!(
            "SELECT {} FROM wallets WHERE user_id = $1 ORDER BY id LIMIT 1 FOR UPDATE",
            WALLET_COLUMNS
        );
        let row: Option<WalletRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(wallet_from_row))
    }

    async fn reserve_disbursement_id(&mut self) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('disbursements', 'id'))")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(id)
    }

    async fn insert_disbursement(&mut self, record: &NewDisbursement) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO disbursements (
                id, user_id, wallet_id, bank_account_id, amount,
                status, reference, description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $8)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.wallet_id)
        .bind(record.bank_account_id)
        .bind(record.amount.value())
        .bind(&record.reference)
        .bind(&record.description)
        .bind(record.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;

        Ok(id)
    }

    async fn debit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        // Guarded: never takes the balance below zero
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE wallets
            SET balance = balance - $2, updated_at = $3
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(wallet_id)
        .bind(amount.value())
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?;

        balance.ok_or(StoreError::InsufficientFunds {
            wallet_id,
            requested: amount.value(),
        })
    }

    async fn credit_wallet(
        &mut self,
        wallet_id: i64,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = $3
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(wallet_id)
        .bind(amount.value())
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?;

        balance.ok_or(StoreError::RowNotFound {
            table: "wallets",
            id: wallet_id,
        })
    }

    async fn update_disbursement_status(
        &mut self,
        id: i64,
        status: DisbursementStatus,
        completed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET status = $2, completed_at = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(completed_at)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM disbursements WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *self.tx)
                    .await?;

            return Err(if exists {
                StoreError::AlreadyFinalized(id)
            } else {
                StoreError::RowNotFound {
                    table: "disbursements",
                    id,
                }
            });
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disbursement_from_row() {
        let now = Utc::now();
        let row: DisbursementRow = (
            5,
            1,
            1,
            1,
            1_000_000,
            "completed".to_string(),
            "DSB-1700000000-1-5".to_string(),
            None,
            now,
            now,
            Some(now),
        );

        let record = disbursement_from_row(row).unwrap();
        assert_eq!(record.status, DisbursementStatus::Completed);
        assert_eq!(record.completed_at, Some(now));
    }

    #[test]
    fn test_disbursement_from_row_rejects_unknown_status() {
        let now = Utc::now();
        let row: DisbursementRow = (
            5,
            1,
            1,
            1,
            10,
            "settled".to_string(),
            "DSB-1-1-5".to_string(),
            None,
            now,
            now,
            None,
        );

        assert!(matches!(disbursement_from_row(row), Err(StoreError::Corrupt(_))));
    }
}
