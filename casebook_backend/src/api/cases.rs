use super::{ActingUser, ApiError, ApiResult, AppState};
use crate::cases::{CaseFilter, CaseService, CaseView, CreateCaseInput, UpdateCaseInput};
use crate::comments::{CommentNode, CommentService, CommentView, CreateCommentInput};
use crate::trending::TrendingItem;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListCasesParams {
    #[serde(default = "default_case_limit")]
    limit: usize,
    specialty: Option<String>,
    owner: Option<String>,
}

fn default_case_limit() -> usize {
    20
}

pub(crate) async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<ListCasesParams>,
) -> ApiResult<Vec<CaseView>> {
    let filter = match (params.specialty, params.owner) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "filter by either specialty or owner, not both".into(),
            ))
        }
        (Some(specialty), None) => CaseFilter::Specialty(specialty),
        (None, Some(owner)) => CaseFilter::Owner(owner),
        (None, None) => CaseFilter::Recent,
    };
    let service = CaseService::new(state.database.clone());
    Ok(Json(service.list_cases(filter, params.limit)?))
}

pub(crate) async fn create_case(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<CreateCaseInput>,
) -> Result<(StatusCode, Json<CaseView>), ApiError> {
    let service = CaseService::new(state.database.clone());
    let case = service.create_case(&user_id, payload)?;
    Ok((StatusCode::CREATED, Json(case)))
}

pub(crate) async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> ApiResult<CaseView> {
    let service = CaseService::new(state.database.clone());
    Ok(Json(service.get_case(&case_id)?))
}

pub(crate) async fn update_case(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(case_id): Path<String>,
    Json(payload): Json<UpdateCaseInput>,
) -> ApiResult<CaseView> {
    let service = CaseService::new(state.database.clone());
    Ok(Json(service.update_case(&case_id, &user_id, payload)?))
}

pub(crate) async fn comment_tree(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> ApiResult<Vec<CommentNode>> {
    let cases = CaseService::new(state.database.clone());
    cases.get_case(&case_id)?;
    let service = CommentService::new(state.database.clone());
    Ok(Json(service.comment_tree(&case_id)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddCommentRequest {
    body: String,
    #[serde(default)]
    parent_comment_id: Option<String>,
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(case_id): Path<String>,
    Json(payload): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let service = CommentService::new(state.database.clone());
    let comment = service.add_comment(
        &case_id,
        CreateCommentInput {
            author_user_id: user_id,
            body: payload.body,
            parent_comment_id: payload.parent_comment_id,
        },
    )?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendingParams {
    #[serde(default = "default_trending_limit")]
    limit: usize,
}

fn default_trending_limit() -> usize {
    10
}

pub(crate) async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> ApiResult<Vec<TrendingItem>> {
    Ok(Json(state.trending.get_trending(params.limit)?))
}
