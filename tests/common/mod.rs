//! Common test utilities

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

use wallet_disbursement::api::{self, AppState};
use wallet_disbursement::handlers::DisbursementHandler;
use wallet_disbursement::settlement::{SettlementGateway, SimulatedSettlementGateway};
use wallet_disbursement::store::InMemoryEntityStore;

const SCHEMA: &str = include_str!("../../migrations/0001_create_disbursement_tables.sql");

/// Seeded in-memory store plus the router serving it
pub async fn memory_app() -> (InMemoryEntityStore, axum::Router) {
    memory_app_with_gateway(Arc::new(SimulatedSettlementGateway::new())).await
}

pub async fn memory_app_with_gateway(
    gateway: Arc<dyn SettlementGateway>,
) -> (InMemoryEntityStore, axum::Router) {
    let store = InMemoryEntityStore::seeded()
        .await
        .expect("Failed to seed in-memory store");
    let handler = DisbursementHandler::new(Arc::new(store.clone()), gateway);
    (store, api::app(AppState::new(handler)))
}

/// Exclusive handle on the test database
pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

fn db_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Setup test database - apply schema, truncate tables and seed fixtures
///
/// Returns `None` when `DATABASE_URL` is not set so the caller can skip.
pub async fn setup_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };

    let guard = db_lock().lock().await;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to apply schema");
    }

    sqlx::query(
        "TRUNCATE TABLE disbursements, wallets, bank_accounts, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    let seeded = wallet_disbursement::db::seed_test_data(&pool)
        .await
        .expect("Failed to seed fixtures");
    assert!(seeded, "fixtures were not inserted into an empty database");

    Some(TestDb {
        pool,
        _guard: guard,
    })
}
