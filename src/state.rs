use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::billing::{BillingProvider, StripeBilling};
use crate::config::AppConfig;
use crate::recommendations::{OpenAiEngine, RecommendationEngine};
use crate::store::{PgStore, ProfileStore};
use crate::subscriptions::reconciler::PriceTable;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub prices: Arc<PriceTable>,
    pub store: Arc<dyn ProfileStore>,
    pub engine: Arc<dyn RecommendationEngine>,
    pub billing: Arc<dyn BillingProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        let store = PgStore::new(db);
        if let Err(e) = store.migrate().await {
            warn!(error = %e, "migration failed; continuing");
        }

        if config.recommendations.api_key.is_none() {
            warn!("OPENAI_API_KEY not set; plan generation will fail upstream");
        }
        let engine = Arc::new(OpenAiEngine::new(&config.recommendations)?)
            as Arc<dyn RecommendationEngine>;
        let billing =
            Arc::new(StripeBilling::new(&config.billing)?) as Arc<dyn BillingProvider>;

        Ok(Self::from_parts(
            config,
            Arc::new(store) as Arc<dyn ProfileStore>,
            engine,
            billing,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn ProfileStore>,
        engine: Arc<dyn RecommendationEngine>,
        billing: Arc<dyn BillingProvider>,
    ) -> Self {
        let prices = Arc::new(PriceTable::from_config(&config.billing));
        Self {
            config,
            prices,
            store,
            engine,
            billing,
        }
    }
}
