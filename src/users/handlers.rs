use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateUserRequest, UpdateUserRequest, UserLookupQuery, UserView};
use super::services::{create_user, find_user_by_email, get_user, update_user};
use crate::error::{AppError, Envelope};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(lookup))
        .route("/users/:id", get(show).patch(edit))
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Envelope<UserView>>), AppError> {
    let user = create_user(&state, body.into()).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(user.into()))))
}

#[instrument(skip(state, q))]
pub async fn lookup(
    State(state): State<AppState>,
    Query(q): Query<UserLookupQuery>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let user = find_user_by_email(&state, &q.email).await?;
    Ok(Json(Envelope::ok(user.into())))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let user = get_user(&state, id).await?;
    Ok(Json(Envelope::ok(user.into())))
}

#[instrument(skip(state, body))]
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let user = update_user(&state, id, body.into()).await?;
    Ok(Json(Envelope::ok(user.into())))
}
