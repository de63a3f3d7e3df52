//! Billing provider client: customers, checkout and portal sessions, and
//! subscription lookups and updates.

#[cfg(test)]
pub mod fake;
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use stripe::StripeBilling;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Subscription as the provider reports it. Period bounds are unix seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Creates a customer tagged with the user id and returns its reference.
    async fn create_customer(&self, email: &str, name: &str, user_id: Uuid)
        -> anyhow::Result<String>;

    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession>;

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> anyhow::Result<Vec<ProviderSubscription>>;

    /// `true` schedules cancellation at period end, `false` undoes it.
    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> anyhow::Result<ProviderSubscription>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> anyhow::Result<PortalSession>;
}
