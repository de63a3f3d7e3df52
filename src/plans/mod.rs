//! Plan generation: targets, per-slot meal suggestions, recipe materialization.

pub mod dto;
pub mod handlers;
pub mod materializer;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
