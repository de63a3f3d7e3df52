//! Daily progress logs and the rolling statistics derived from them.

pub mod dto;
pub mod handlers;
pub mod services;
pub mod stats;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
