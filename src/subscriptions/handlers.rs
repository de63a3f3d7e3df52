use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use super::dto::{
    CheckoutBody, CheckoutResponse, ManageBody, ManageResponse, SubscriptionQuery,
    SubscriptionResponse,
};
use super::reconciler::{reconcile, BillingEvent};
use super::services::{get_subscription, manage_subscription, start_checkout, SubscriptionAction};
use super::signature;
use crate::error::{AppError, Envelope};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(subscription).put(manage))
        .route("/subscriptions/checkout", post(checkout))
        .route("/webhooks/stripe", post(stripe_webhook))
}

#[instrument(skip(state))]
pub async fn subscription(
    State(state): State<AppState>,
    Query(q): Query<SubscriptionQuery>,
) -> Result<Json<Envelope<SubscriptionResponse>>, AppError> {
    let summary = get_subscription(&state, q.user_id).await?;
    Ok(Json(Envelope::ok(summary.into())))
}

#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<Envelope<CheckoutResponse>>, AppError> {
    let session = start_checkout(
        &state,
        body.user_id,
        body.plan_id,
        &body.success_url,
        &body.cancel_url,
    )
    .await?;
    Ok(Json(Envelope::ok(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    })))
}

#[instrument(skip(state, body), fields(user_id = %body.user_id, action = %body.action))]
pub async fn manage(
    State(state): State<AppState>,
    Json(body): Json<ManageBody>,
) -> Result<Json<Envelope<ManageResponse>>, AppError> {
    let action: SubscriptionAction = body.action.trim().parse()?;
    let outcome = manage_subscription(
        &state,
        body.user_id,
        action,
        body.subscription_id.as_deref(),
    )
    .await?;
    Ok(Json(Envelope::ok(outcome.into())))
}

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

/// POST /webhooks/stripe
/// Verifies the signature over the raw body, then hands the event to the
/// reconciler. Once verified, the delivery is always acknowledged.
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(secret) = state.config.billing.webhook_secret.as_deref() else {
        warn!("webhook received but no webhook secret is configured");
        return Err(bad_request("Webhook not configured"));
    };
    let Some(sig) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return Err(bad_request("Missing signature"));
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if let Err(e) = signature::verify(sig, &body, secret, now) {
        warn!(error = %e, "webhook signature rejected");
        return Err(bad_request("Invalid signature"));
    }

    let event: BillingEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "webhook envelope unparseable");
        bad_request("Invalid event payload")
    })?;

    let outcome = reconcile(&state, &event).await;
    tracing::debug!(event_id = %event.id, ?outcome, "webhook processed");
    Ok(Json(json!({ "received": true })))
}
