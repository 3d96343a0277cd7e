//! REST facade: read-only views over sessions. All mutation goes through
//! the WebSocket gateway; these routes exist for reconnecting clients and
//! for result/export reads once a session has completed.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::session::{QuestionView, SessionResults, SessionSummary},
    error::AppError,
    services::session_service,
    session::SharedState,
};

/// Routes serving historical and progress reads.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/question", get(get_current_question))
        .route("/sessions/{id}/results", get(get_results))
}

/// Fetch the current state of a session in any lifecycle status.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "session",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session state", body = SessionSummary),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::get_session(&state, id).await?;
    Ok(Json((&session).into()))
}

/// Fetch the question currently in play, answer key stripped.
#[utoipa::path(
    get,
    path = "/sessions/{id}/question",
    tag = "session",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current question with progress counters", body = QuestionView),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session has not started")
    )
)]
pub async fn get_current_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionView>, AppError> {
    let question = session_service::current_question(&state, id).await?;
    Ok(Json(question))
}

/// Export the final results of a completed session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/results",
    tag = "session",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Final leaderboard and per-participant answers", body = SessionResults),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session has not completed")
    )
)]
pub async fn get_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResults>, AppError> {
    let results = session_service::session_results(&state, id).await?;
    Ok(Json(results))
}
