//! Database module
//!
//! Connectivity checks, schema verification and fixture seeding.
//! The schema itself lives in raw SQL files under `migrations/`.

use sqlx::PgPool;

/// One seeded user with their bank account and wallet
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub name: &'static str,
    pub email: &'static str,
    pub bank_name: &'static str,
    pub account_number: &'static str,
    pub balance: i64,
    pub currency: &'static str,
}

/// Standard fixtures, inserted in order so ids are 1, 2, 3 on an empty store
pub const FIXTURES: [Fixture; 3] = [
    Fixture {
        name: "John Doe",
        email: "john@example.com",
        bank_name: "BCA",
        account_number: "1234567890",
        balance: 5_000_000,
        currency: "IDR",
    },
    Fixture {
        name: "Jane Smith",
        email: "jane@example.com",
        bank_name: "Mandiri",
        account_number: "0987654321",
        balance: 2_500_000,
        currency: "IDR",
    },
    Fixture {
        name: "Mike Seed",
        email: "mike@example.com",
        bank_name: "BNI",
        account_number: "1122334455",
        balance: 7_500_000,
        currency: "IDR",
    },
];

const REQUIRED_TABLES: [&str; 4] = ["users", "bank_accounts", "wallets", "disbursements"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!(
                "Required table '{}' does not exist. Apply migrations/ first.",
                table
            );
            return Ok(false);
        }
    }

    Ok(true)
}

/// Insert the standard fixtures in one transaction.
///
/// Does nothing when the users table already has rows. Returns whether
/// anything was inserted.
pub async fn seed_test_data(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        tracing::debug!(users = count, "Users present, skipping seed");
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    for fixture in FIXTURES {
        let user_id: i64 =
            sqlx::query_scalar("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id")
                .bind(fixture.name)
                .bind(fixture.email)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO bank_accounts (user_id, bank_name, account_number, account_name)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(fixture.bank_name)
        .bind(fixture.account_number)
        .bind(fixture.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO wallets (user_id, balance, currency) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(fixture.balance)
            .bind(fixture.currency)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(users = FIXTURES.len(), "Seeded fixture users and wallets");
    Ok(true)
}
