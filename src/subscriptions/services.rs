use std::future::Future;

use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::catalog::{plan_for, PlanInfo, PLANS};
use crate::billing::{CheckoutRequest, CheckoutSession, ProviderSubscription};
use crate::error::AppError;
use crate::models::{SubscriptionTier, UserProfile};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct SubscriptionSummary {
    pub tier: SubscriptionTier,
    pub current_plan: &'static PlanInfo,
    pub available_plans: &'static [PlanInfo],
    pub has_billing_customer: bool,
    /// Active subscriptions at the provider. Empty when the lookup fails.
    pub provider_subscriptions: Vec<ProviderSubscription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Cancel,
    Reactivate,
    Portal,
}

impl std::str::FromStr for SubscriptionAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(Self::Cancel),
            "reactivate" => Ok(Self::Reactivate),
            "portal" => Ok(Self::Portal),
            other => Err(AppError::validation(
                "action",
                format!("unknown action {other:?}, expected cancel, reactivate or portal"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManageOutcome {
    Subscription(ProviderSubscription),
    Portal { url: String },
}

async fn load_user(st: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    st.store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}

async fn billing_call<T, F>(st: &AppState, what: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let limit = st.config.billing.timeout();
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => {
            warn!(error = %e, "{what} failed");
            Err(AppError::Upstream(format!("{what} failed")))
        }
        Err(_) => {
            warn!(?limit, "{what} timed out");
            Err(AppError::Upstream(format!("{what} timed out")))
        }
    }
}

fn validate_redirect(field: &'static str, raw: &str) -> Result<(), AppError> {
    let Ok(parsed) = Url::parse(raw) else {
        return Err(AppError::validation(field, "must be an absolute http(s) url"));
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::validation(field, "scheme must be http or https"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::validation(field, "url has no host"));
    }
    Ok(())
}

/// Returns the user's billing customer, creating and storing one on first use.
async fn ensure_customer(st: &AppState, user: &UserProfile) -> Result<String, AppError> {
    if let Some(existing) = &user.billing_customer_id {
        return Ok(existing.clone());
    }
    let created = billing_call(
        st,
        "create billing customer",
        st.billing.create_customer(&user.email, &user.name, user.id),
    )
    .await?;

    if st
        .store
        .set_billing_customer_if_absent(user.id, &created)
        .await?
    {
        info!(user_id = %user.id, "billing customer created");
        return Ok(created);
    }
    // another request attached one first
    let stored = load_user(st, user.id).await?.billing_customer_id;
    Ok(stored.unwrap_or(created))
}

#[instrument(skip(st, success_url, cancel_url))]
pub async fn start_checkout(
    st: &AppState,
    user_id: Uuid,
    tier: SubscriptionTier,
    success_url: &str,
    cancel_url: &str,
) -> Result<CheckoutSession, AppError> {
    if tier == SubscriptionTier::Free {
        return Err(AppError::validation(
            "planId",
            "the free plan has no checkout",
        ));
    }
    validate_redirect("successUrl", success_url)?;
    validate_redirect("cancelUrl", cancel_url)?;

    let user = load_user(st, user_id).await?;
    let price_id = st
        .prices
        .price_for(tier)
        .ok_or_else(|| AppError::validation("planId", "plan is not available for subscription"))?
        .to_string();

    let customer_id = ensure_customer(st, &user).await?;
    let req = CheckoutRequest {
        customer_id,
        price_id,
        success_url: success_url.to_string(),
        cancel_url: cancel_url.to_string(),
        user_id,
    };
    let session = billing_call(
        st,
        "create checkout session",
        st.billing.create_checkout_session(&req),
    )
    .await?;
    info!(%user_id, %tier, session_id = %session.id, "checkout started");
    Ok(session)
}

pub async fn get_subscription(
    st: &AppState,
    user_id: Uuid,
) -> Result<SubscriptionSummary, AppError> {
    let user = load_user(st, user_id).await?;
    let provider_subscriptions = match &user.billing_customer_id {
        Some(customer) => billing_call(
            st,
            "list subscriptions",
            st.billing.list_active_subscriptions(customer),
        )
        .await
        .unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(SubscriptionSummary {
        tier: user.subscription_tier,
        current_plan: plan_for(user.subscription_tier),
        available_plans: &PLANS,
        has_billing_customer: user.billing_customer_id.is_some(),
        provider_subscriptions,
    })
}

/// Cancels at period end, undoes a pending cancellation, or opens the
/// provider's self-service portal. Cancel and reactivate only touch
/// subscriptions that belong to the user's billing customer.
#[instrument(skip(st))]
pub async fn manage_subscription(
    st: &AppState,
    user_id: Uuid,
    action: SubscriptionAction,
    subscription_id: Option<&str>,
) -> Result<ManageOutcome, AppError> {
    let user = st
        .store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("billing account".into()))?;
    let customer = user
        .billing_customer_id
        .ok_or_else(|| AppError::NotFound("billing account".into()))?;

    let cancel = match action {
        SubscriptionAction::Portal => {
            let session = billing_call(
                st,
                "create portal session",
                st.billing
                    .create_portal_session(&customer, &st.config.billing.portal_return_url),
            )
            .await?;
            info!(%user_id, "billing portal opened");
            return Ok(ManageOutcome::Portal { url: session.url });
        }
        SubscriptionAction::Cancel => true,
        SubscriptionAction::Reactivate => false,
    };

    let subscription_id = subscription_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("subscriptionId", "is required for this action"))?;
    let owned = billing_call(
        st,
        "list subscriptions",
        st.billing.list_active_subscriptions(&customer),
    )
    .await?;
    if !owned.iter().any(|s| s.id == subscription_id) {
        warn!(%user_id, subscription_id, "subscription not owned by user");
        return Err(AppError::NotFound("subscription".into()));
    }

    let updated = billing_call(
        st,
        "update subscription",
        st.billing.set_cancel_at_period_end(subscription_id, cancel),
    )
    .await?;
    info!(%user_id, subscription_id, cancel_at_period_end = cancel, "subscription updated");
    Ok(ManageOutcome::Subscription(updated))
}
