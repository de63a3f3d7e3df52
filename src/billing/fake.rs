use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{BillingProvider, CheckoutRequest, CheckoutSession, PortalSession, ProviderSubscription};

#[derive(Default)]
pub struct FakeBilling {
    pub customers_created: AtomicUsize,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    /// `(customer id, subscription)` pairs.
    pub subscriptions: Mutex<Vec<(String, ProviderSubscription)>>,
    pub portal_sessions: Mutex<Vec<(String, String)>>,
    pub fail_listing: AtomicBool,
}

impl FakeBilling {
    pub fn add_subscription(&self, customer_id: &str, subscription_id: &str) {
        self.subscriptions.lock().unwrap().push((
            customer_id.to_string(),
            ProviderSubscription {
                id: subscription_id.to_string(),
                status: "active".into(),
                current_period_start: Some(1_700_000_000),
                current_period_end: Some(1_702_592_000),
                cancel_at_period_end: false,
            },
        ));
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_customer(
        &self,
        _email: &str,
        _name: &str,
        user_id: Uuid,
    ) -> anyhow::Result<String> {
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_{}_{n}", user_id.simple()))
    }

    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(req.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", checkouts.len()),
            url: Some(format!("https://checkout.test/{}", checkouts.len())),
        })
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> anyhow::Result<Vec<ProviderSubscription>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("billing GET subscriptions returned 500");
        }
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, s)| c == customer_id && s.status == "active")
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> anyhow::Result<ProviderSubscription> {
        let mut subs = self.subscriptions.lock().unwrap();
        let Some((_, sub)) = subs.iter_mut().find(|(_, s)| s.id == subscription_id) else {
            anyhow::bail!("no such subscription: {subscription_id}");
        };
        sub.cancel_at_period_end = cancel;
        Ok(sub.clone())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> anyhow::Result<PortalSession> {
        let mut sessions = self.portal_sessions.lock().unwrap();
        sessions.push((customer_id.to_string(), return_url.to_string()));
        Ok(PortalSession {
            url: format!("https://portal.test/{}", sessions.len()),
        })
    }
}
