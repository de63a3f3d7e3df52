//! Subscription tiers: plan catalog, checkout, and billing event reconciliation.

pub mod catalog;
pub mod dto;
pub mod handlers;
pub mod reconciler;
pub mod services;
pub mod signature;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
