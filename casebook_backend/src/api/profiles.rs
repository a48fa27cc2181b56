use super::{ActingUser, ApiResult, AppState};
use crate::profiles::{ProfileService, ProfileUpdate, ProfileView};
use axum::extract::{Path, State};
use axum::Json;

pub(crate) async fn get_own_profile(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> ApiResult<ProfileView> {
    let service = ProfileService::new(state.database.clone());
    Ok(Json(service.get_profile(&user_id)?))
}

pub(crate) async fn upsert_own_profile(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<ProfileView> {
    let service = ProfileService::new(state.database.clone());
    Ok(Json(service.upsert_profile(&user_id, payload)?))
}

pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileView> {
    let service = ProfileService::new(state.database.clone());
    Ok(Json(service.get_profile(&user_id)?))
}
