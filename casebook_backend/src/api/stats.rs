use super::{ApiResult, AppState};
use crate::stats::{StatsOverview, StatsService, UserStats};
use axum::extract::{Path, State};
use axum::Json;

pub(crate) async fn overview(State(state): State<AppState>) -> ApiResult<StatsOverview> {
    let service = StatsService::new(state.database.clone());
    Ok(Json(service.overview()?))
}

pub(crate) async fn user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserStats> {
    let service = StatsService::new(state.database.clone());
    Ok(Json(service.user_stats(&user_id)?))
}
