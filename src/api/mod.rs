//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::DisbursementHandler;
use crate::projection::ProjectionService;

pub use routes::create_router;

/// Default bound on a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub disbursements: Arc<DisbursementHandler>,
    pub projection: ProjectionService,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(disbursements: DisbursementHandler) -> Self {
        let projection = disbursements.projection().clone();
        Self {
            disbursements: Arc::new(disbursements),
            projection,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Routes with request middleware and state applied
///
/// Layers run outermost first: context, then logging, then the route.
pub fn app(state: AppState) -> Router {
    create_router()
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::context_middleware))
        .with_state(state)
}
