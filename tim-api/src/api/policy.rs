//! Policy event endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::HashMap;
use tim_common::{db, PolicyEvent};

use crate::{ApiError, ApiResult, AppState};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// `limit` from the query string; anything but an integer in 1..=100 is a bad request
fn parse_limit(params: &HashMap<String, String>) -> ApiResult<u32> {
    let out_of_range = || ApiError::BadRequest(format!("limit must be between 1 and {}", MAX_LIMIT));

    match params.get("limit") {
        None => Ok(DEFAULT_LIMIT),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            _ => Err(out_of_range()),
        },
    }
}

/// GET /api/policy?limit=N
///
/// Most recent events first. `limit` defaults to 10 and must be 1..=100.
pub async fn recent_policy_events(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<PolicyEvent>>> {
    let limit = parse_limit(&params)?;
    Ok(Json(db::get_recent_policy_events(&state.db, limit).await?))
}
