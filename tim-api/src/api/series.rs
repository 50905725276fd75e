//! Time series endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use tim_common::{db, TimeSeries};

use crate::{ApiError, ApiResult, AppState};

/// GET /api/series/:id
pub async fn get_series(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimeSeries>> {
    db::get_time_series(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Series '{}'", id)))
}
