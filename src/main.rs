//! Wallet Disbursement Service
//!
//! Backend API that moves funds from a user's wallet to one of their bank
//! accounts, one atomic unit per request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_disbursement::api::{self, AppState};
use wallet_disbursement::db;
use wallet_disbursement::handlers::DisbursementHandler;
use wallet_disbursement::settlement::SimulatedSettlementGateway;
use wallet_disbursement::store::{EntityStore, InMemoryEntityStore, PgEntityStore};
use wallet_disbursement::{Config, StorageBackend};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wallet_disbursement=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// CORS from the configured origin list
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

/// Build the application router
fn build_router(state: AppState, config: &Config) -> Router {
    api::app(state)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// Open the configured store; returns the pool too so it can be closed
async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn EntityStore>, Option<PgPool>)> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            let store = if config.seed_data {
                InMemoryEntityStore::seeded().await?
            } else {
                InMemoryEntityStore::new()
            };
            Ok((Arc::new(store), None))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;

            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;

            db::verify_connection(&pool).await?;
            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }
            tracing::info!("Database connected successfully");

            if config.seed_data {
                db::seed_test_data(&pool).await?;
            }

            Ok((Arc::new(PgEntityStore::new(pool.clone())), Some(pool)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.is_production());

    let addr: SocketAddr = config.bind_address().parse()?;
    tracing::info!(
        environment = %config.environment,
        backend = ?config.storage_backend,
        "Starting wallet disbursement server"
    );

    let (store, pool) = open_store(&config).await?;

    let gateway =
        SimulatedSettlementGateway::new().with_latency(config.settlement_latency);
    let handler = DisbursementHandler::new(store, Arc::new(gateway))
        .with_settlement_timeout(config.settlement_timeout);
    let state = AppState::new(handler).with_request_timeout(config.request_timeout);

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
