//! REST API over the results of a control run.
//!
//! Provides three GET endpoints:
//! - `/state` - run summary and the latest cycle
//! - `/recommendations` - latest pump recommendations, optionally per station
//! - `/goals` - latest group clearings and participant goals

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::control::{CycleResult, RunSummary};

pub use types::{ErrorResponse, GoalRow, RecommendationQuery, StateResponse};

/// Immutable application state shared across all request handlers.
///
/// Built once after the control cycles complete; read-only, so no locks.
pub struct AppState {
    /// Names of every configured pump station.
    pub stations: Vec<String>,
    pub summary: RunSummary,
    /// Per-cycle results, oldest first.
    pub results: Vec<CycleResult>,
}

impl AppState {
    pub fn new(stations: Vec<String>, results: Vec<CycleResult>) -> Self {
        Self {
            stations,
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    pub fn latest(&self) -> Option<&CycleResult> {
        self.results.last()
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/recommendations", get(handlers::get_recommendations))
        .route("/goals", get(handlers::get_goals))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the server stops.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
