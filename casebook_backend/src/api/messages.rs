use super::{ActingUser, ApiError, ApiResult, AppState};
use crate::messaging::{MessageView, MessagingService, ThreadView, DEFAULT_MESSAGE_LIMIT};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    recipient_user_id: String,
    body: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetMessagesParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_MESSAGE_LIMIT
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct MarkReadResponse {
    updated: usize,
}

pub(crate) async fn list_threads(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> ApiResult<Vec<ThreadView>> {
    let service = MessagingService::new(state.database.clone());
    Ok(Json(service.list_threads(&user_id)?))
}

pub(crate) async fn send_message(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let service = MessagingService::new(state.database.clone());
    let message = service.send_message(&user_id, &payload.recipient_user_id, &payload.body)?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub(crate) async fn list_messages(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(thread_id): Path<String>,
    Query(params): Query<GetMessagesParams>,
) -> ApiResult<Vec<MessageView>> {
    let service = MessagingService::new(state.database.clone());
    Ok(Json(service.list_messages(&thread_id, &user_id, params.limit)?))
}

pub(crate) async fn mark_thread_read(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(thread_id): Path<String>,
) -> ApiResult<MarkReadResponse> {
    let service = MessagingService::new(state.database.clone());
    let updated = service.mark_thread_read(&thread_id, &user_id)?;
    Ok(Json(MarkReadResponse { updated }))
}

pub(crate) async fn count_unread(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> ApiResult<UnreadCountResponse> {
    let service = MessagingService::new(state.database.clone());
    let count = service.count_unread(&user_id)?;
    Ok(Json(UnreadCountResponse { count }))
}
