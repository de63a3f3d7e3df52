use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{
    LogProgressRequest, LoggedProgressResponse, ProgressLogView, ProgressQuery, ProgressResponse,
    UpdateProgressRequest,
};
use super::services::{
    compute_stats, list_logs, progress_overview, today, update_log, upsert_log,
};
use super::stats::ProgressStats;
use crate::error::{AppError, Envelope};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/progress",
            get(get_progress).post(log_progress).put(edit_progress),
        )
        .route("/progress/logs", get(get_logs))
        .route("/progress/stats", get(get_stats))
}

#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn log_progress(
    State(state): State<AppState>,
    Json(body): Json<LogProgressRequest>,
) -> Result<Json<Envelope<LoggedProgressResponse>>, AppError> {
    let (user_id, date, patch) = body.into_parts();
    let log = upsert_log(&state, user_id, date, patch).await?;
    Ok(Json(Envelope::ok(LoggedProgressResponse {
        progress_log: log.into(),
    })))
}

#[instrument(skip(state, body), fields(log_id = %body.log_id))]
pub async fn edit_progress(
    State(state): State<AppState>,
    Json(body): Json<UpdateProgressRequest>,
) -> Result<Json<Envelope<LoggedProgressResponse>>, AppError> {
    let (log_id, patch) = body.into_parts();
    let log = update_log(&state, log_id, patch).await?;
    Ok(Json(Envelope::ok(LoggedProgressResponse {
        progress_log: log.into(),
    })))
}

#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<AppState>,
    Query(q): Query<ProgressQuery>,
) -> Result<Json<Envelope<ProgressResponse>>, AppError> {
    let overview = progress_overview(&state, q.user_id, q.days, today()).await?;
    Ok(Json(Envelope::ok(overview.into())))
}

#[instrument(skip(state))]
pub async fn get_logs(
    State(state): State<AppState>,
    Query(q): Query<ProgressQuery>,
) -> Result<Json<Envelope<Vec<ProgressLogView>>>, AppError> {
    let logs = list_logs(&state, q.user_id, q.days, today()).await?;
    Ok(Json(Envelope::ok(logs.into_iter().map(Into::into).collect())))
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    Query(q): Query<ProgressQuery>,
) -> Result<Json<Envelope<ProgressStats>>, AppError> {
    let stats = compute_stats(&state, q.user_id, q.days, today()).await?;
    Ok(Json(Envelope::ok(stats)))
}
