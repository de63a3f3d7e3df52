use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{ActivePlanQuery, ActivePlanResponse, GeneratePlanRequest, GeneratedPlanResponse};
use super::services::{generate_plan, get_active_plan};
use crate::error::{AppError, Envelope};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/plans/active", get(active_plan))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/plans", post(create_plan))
}

#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<GeneratePlanRequest>,
) -> Result<Json<Envelope<GeneratedPlanResponse>>, AppError> {
    let gen = generate_plan(&state, body.user_id, body.regenerate).await?;
    Ok(Json(Envelope::ok(gen.into())))
}

#[instrument(skip(state))]
pub async fn active_plan(
    State(state): State<AppState>,
    Query(q): Query<ActivePlanQuery>,
) -> Result<Json<Envelope<ActivePlanResponse>>, AppError> {
    let active = get_active_plan(&state, q.user_id).await?;
    Ok(Json(Envelope::ok(active.into())))
}
