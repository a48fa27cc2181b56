use super::{ActingUser, ApiResult, AppState};
use crate::database::models::ReactionType;
use crate::reactions::{ReactionOutcome, ReactionService, ReactionSubject, ReactionSummary};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ReactRequest {
    reaction_type: ReactionType,
}

fn reactions_response(state: &AppState, subject: ReactionSubject) -> ApiResult<ReactionSummary> {
    let service = ReactionService::new(state.database.clone());
    Ok(Json(service.reaction_summary(&subject)?))
}

fn react(
    state: &AppState,
    subject: ReactionSubject,
    user_id: &str,
    reaction_type: ReactionType,
) -> ApiResult<ReactionOutcome> {
    let service = ReactionService::new(state.database.clone());
    Ok(Json(service.react(&subject, user_id, reaction_type)?))
}

pub(crate) async fn react_to_case(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(case_id): Path<String>,
    Json(payload): Json<ReactRequest>,
) -> ApiResult<ReactionOutcome> {
    react(&state, ReactionSubject::Case(case_id), &user_id, payload.reaction_type)
}

pub(crate) async fn react_to_comment(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(comment_id): Path<String>,
    Json(payload): Json<ReactRequest>,
) -> ApiResult<ReactionOutcome> {
    react(&state, ReactionSubject::Comment(comment_id), &user_id, payload.reaction_type)
}

pub(crate) async fn withdraw_comment_reaction(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(comment_id): Path<String>,
) -> ApiResult<ReactionOutcome> {
    let service = ReactionService::new(state.database.clone());
    let outcome = service.withdraw(&ReactionSubject::Comment(comment_id), &user_id)?;
    Ok(Json(outcome))
}

pub(crate) async fn case_reactions(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> ApiResult<ReactionSummary> {
    reactions_response(&state, ReactionSubject::Case(case_id))
}

pub(crate) async fn comment_reactions(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> ApiResult<ReactionSummary> {
    reactions_response(&state, ReactionSubject::Comment(comment_id))
}
