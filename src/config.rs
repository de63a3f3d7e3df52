use std::time::Duration;

use serde::Deserialize;

use crate::plans::materializer::MaterializePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl RecommendationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub basic_price_id: Option<String>,
    pub premium_price_id: Option<String>,
    /// Where the billing portal sends the user back to.
    pub portal_return_url: String,
    pub timeout_secs: u64,
}

impl BillingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub recommendations: RecommendationConfig,
    pub billing: BillingConfig,
    pub materialize: MaterializePolicy,
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let recommendations = RecommendationConfig {
            api_key: optional("OPENAI_API_KEY"),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".into()),
            timeout_secs: secs("RECOMMENDATION_TIMEOUT_SECS", 30),
        };
        let billing = BillingConfig {
            secret_key: optional("STRIPE_SECRET_KEY"),
            webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            basic_price_id: optional("STRIPE_BASIC_PRICE_ID"),
            premium_price_id: optional("STRIPE_PREMIUM_PRICE_ID"),
            portal_return_url: format!(
                "{}/dashboard",
                std::env::var("APP_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".into())
                    .trim_end_matches('/')
            ),
            timeout_secs: secs("BILLING_TIMEOUT_SECS", 15),
        };
        Ok(Self {
            database_url,
            recommendations,
            billing,
            materialize: MaterializePolicy::default(),
        })
    }
}
