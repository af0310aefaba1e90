//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::control::{CycleResult, RunSummary};

/// Run summary plus the most recent cycle.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub summary: RunSummary,
    /// `null` before the first cycle.
    pub latest: Option<CycleResult>,
}

/// Optional station filter for the recommendations endpoint.
#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub station: Option<String>,
}

/// One participant goal flattened with its group's price.
#[derive(Debug, Serialize)]
pub struct GoalRow {
    pub group: u32,
    pub clearing_price: f64,
    pub asset: String,
    pub location: String,
    pub goal_flow: f64,
    pub goal_volume: f64,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
