//! Module endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use tim_common::{db, Module};

use crate::{ApiError, ApiResult, AppState};

/// GET /api/modules
pub async fn list_modules(State(state): State<AppState>) -> ApiResult<Json<Vec<Module>>> {
    Ok(Json(db::get_all_modules(&state.db).await?))
}

/// GET /api/modules/:slug
///
/// Module with its linked series ids and current KPIs; 404 when absent.
pub async fn get_module(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Module>> {
    db::get_module_by_slug(&state.db, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Module '{}'", slug)))
}
