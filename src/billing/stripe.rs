use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    BillingProvider, CheckoutRequest, CheckoutSession, PortalSession, ProviderSubscription,
};
use crate::config::BillingConfig;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Clone)]
pub struct StripeBilling {
    client: Client,
    secret_key: Option<String>,
    base_url: String,
}

impl StripeBilling {
    pub fn new(cfg: &BillingConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self {
            client,
            secret_key: cfg.secret_key.clone(),
            base_url: API_BASE.to_string(),
        })
    }

    fn secret(&self) -> anyhow::Result<&str> {
        self.secret_key
            .as_deref()
            .context("billing secret key is not configured")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> anyhow::Result<T> {
        let res = req
            .bearer_auth(self.secret()?)
            .send()
            .await
            .with_context(|| format!("billing {what}"))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("billing {what} returned {status}: {body}");
        }
        res.json::<T>()
            .await
            .with_context(|| format!("decode billing response for {what}"))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let req = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .form(form);
        self.send(req, &format!("POST {path}")).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let req = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(query);
        self.send(req, &format!("GET {path}")).await
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    #[instrument(skip(self, email, name))]
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: Uuid,
    ) -> anyhow::Result<String> {
        let form = [
            ("email", email.to_string()),
            ("name", name.to_string()),
            ("metadata[userId]", user_id.to_string()),
        ];
        let customer: CustomerResponse = self.post_form("customers", &form).await?;
        debug!(customer_id = %customer.id, "billing customer created");
        Ok(customer.id)
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession> {
        let user_id = req.user_id.to_string();
        let form = [
            ("customer", req.customer_id.clone()),
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", req.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", req.success_url.clone()),
            ("cancel_url", req.cancel_url.clone()),
            ("metadata[userId]", user_id.clone()),
            ("subscription_data[metadata][userId]", user_id),
        ];
        self.post_form("checkout/sessions", &form).await
    }

    #[instrument(skip(self))]
    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> anyhow::Result<Vec<ProviderSubscription>> {
        let list: ListResponse<ProviderSubscription> = self
            .get_query(
                "subscriptions",
                &[("customer", customer_id), ("status", "active")],
            )
            .await?;
        Ok(list.data)
    }

    #[instrument(skip(self))]
    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> anyhow::Result<ProviderSubscription> {
        let form = [("cancel_at_period_end", cancel.to_string())];
        self.post_form(&format!("subscriptions/{subscription_id}"), &form)
            .await
    }

    #[instrument(skip(self, return_url))]
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> anyhow::Result<PortalSession> {
        let form = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        self.post_form("billing_portal/sessions", &form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> BillingConfig {
        BillingConfig {
            secret_key: secret.map(str::to_string),
            webhook_secret: None,
            basic_price_id: None,
            premium_price_id: None,
            portal_return_url: "http://localhost:3000/dashboard".into(),
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn refuses_calls_without_secret_key() {
        let billing = StripeBilling::new(&config(None)).unwrap();
        let err = billing
            .create_customer("a@b.co", "A", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn subscription_list_decodes_stripe_shape() {
        let list: ListResponse<ProviderSubscription> = serde_json::from_str(
            r#"{"object":"list","data":[{"id":"sub_1","status":"active",
                "current_period_start":1700000000,"current_period_end":1702592000,
                "cancel_at_period_end":true,"items":{"data":[]}}],"has_more":false}"#,
        )
        .unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].current_period_end, Some(1_702_592_000));
        assert!(list.data[0].cancel_at_period_end);
    }

    #[test]
    fn checkout_session_decodes_without_url() {
        let s: CheckoutSession = serde_json::from_str(r#"{"id":"cs_123","url":null}"#).unwrap();
        assert_eq!(s.id, "cs_123");
        assert!(s.url.is_none());
    }
}
