use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::PlanInfo;
use super::services::{ManageOutcome, SubscriptionSummary};
use crate::billing::ProviderSubscription;
use crate::models::SubscriptionTier;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub user_id: Uuid,
    pub plan_id: SubscriptionTier,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub tier: SubscriptionTier,
    pub current_plan: &'static PlanInfo,
    pub available_plans: &'static [PlanInfo],
    pub has_billing_customer: bool,
    pub provider_subscriptions: Vec<ProviderSubscriptionView>,
}

impl From<SubscriptionSummary> for SubscriptionResponse {
    fn from(s: SubscriptionSummary) -> Self {
        Self {
            tier: s.tier,
            current_plan: s.current_plan,
            available_plans: s.available_plans,
            has_billing_customer: s.has_billing_customer,
            provider_subscriptions: s.provider_subscriptions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSubscriptionView {
    pub id: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

impl From<ProviderSubscription> for ProviderSubscriptionView {
    fn from(s: ProviderSubscription) -> Self {
        Self {
            id: s.id,
            status: s.status,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            cancel_at_period_end: s.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageBody {
    pub user_id: Uuid,
    pub action: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<ProviderSubscriptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_url: Option<String>,
}

impl From<ManageOutcome> for ManageResponse {
    fn from(o: ManageOutcome) -> Self {
        match o {
            ManageOutcome::Subscription(s) => Self {
                subscription: Some(s.into()),
                portal_url: None,
            },
            ManageOutcome::Portal { url } => Self {
                subscription: None,
                portal_url: Some(url),
            },
        }
    }
}
