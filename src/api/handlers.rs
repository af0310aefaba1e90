//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, GoalRow, RecommendationQuery, StateResponse};
use crate::actuation::PumpSchedule;

/// `GET /state` → 200 + `StateResponse` JSON
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        summary: state.summary.clone(),
        latest: state.latest().cloned(),
    })
}

/// Returns the latest pump recommendations.
///
/// `GET /recommendations` → 200 + `Vec<PumpSchedule>` JSON
/// `GET /recommendations?station=CON` → that station's pumps only
/// `GET /recommendations?station=XYZ` → 404 + `ErrorResponse` for an unknown station
pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendationQuery>,
) -> impl IntoResponse {
    if let Some(station) = &query.station {
        if !state.stations.iter().any(|s| s == station) {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("unknown station `{station}`"),
                }),
            ));
        }
    }

    let schedules: Vec<PumpSchedule> = state
        .latest()
        .map(|r| {
            r.schedules
                .iter()
                .filter(|s| query.station.as_ref().is_none_or(|name| &s.station == name))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(schedules))
}

/// `GET /goals` → 200 + `Vec<GoalRow>` JSON from the latest cycle
pub async fn get_goals(State(state): State<Arc<AppState>>) -> Json<Vec<GoalRow>> {
    let rows = state
        .latest()
        .map(|r| {
            r.clearings
                .iter()
                .flat_map(|c| {
                    c.participants.iter().map(|p| GoalRow {
                        group: c.group_id,
                        clearing_price: c.clearing_price,
                        asset: p.asset.clone(),
                        location: p.location.clone(),
                        goal_flow: p.goal_flow,
                        goal_volume: p.goal_volume,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Json(rows)
}
