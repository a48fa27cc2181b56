mod cases;
mod messages;
mod profiles;
mod reactions;
mod stats;

use crate::config::CasebookConfig;
use crate::database::Database;
use crate::error::ServiceError;
use crate::trending::TrendingCache;
use anyhow::Result;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Header carrying the acting user's id, set by the upstream auth provider.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub config: CasebookConfig,
    pub database: Database,
    pub trending: Arc<TrendingCache>,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorResponse { message: msg }),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::PermissionDenied(msg) => ApiError::Forbidden(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Store(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// The user on whose behalf a request acts.
#[derive(Debug, Clone)]
pub(crate) struct ActingUser(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ActingUser(value.to_string()))
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER} header")))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(cases::health_handler))
        .route("/cases", get(cases::list_cases).post(cases::create_case))
        .route("/cases/:id", get(cases::get_case).patch(cases::update_case))
        .route("/cases/:id/comments", get(cases::comment_tree).post(cases::add_comment))
        .route("/cases/:id/react", post(reactions::react_to_case))
        .route("/cases/:id/reactions", get(reactions::case_reactions))
        .route("/comments/:id/react", post(reactions::react_to_comment))
        .route("/comments/:id/unreact", post(reactions::withdraw_comment_reaction))
        .route("/comments/:id/reactions", get(reactions::comment_reactions))
        .route("/trending", get(cases::trending))
        .route("/profiles/me", get(profiles::get_own_profile).put(profiles::upsert_own_profile))
        .route("/profiles/:user_id", get(profiles::get_profile))
        .route("/threads", get(messages::list_threads))
        .route("/messages", post(messages::send_message))
        .route("/threads/:id/messages", get(messages::list_messages))
        .route("/threads/:id/read", post(messages::mark_thread_read))
        .route("/messages/unread/count", get(messages::count_unread))
        .route("/stats", get(stats::overview))
        .route("/stats/users/:user_id", get(stats::user_stats))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(state: AppState) -> Result<()> {
    let requested_port = state.config.api_port;
    let router = router(state);

    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
