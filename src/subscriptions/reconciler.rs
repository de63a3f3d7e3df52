//! Billing events to subscription tier.
//!
//! Each recognised event type maps to a transition function in
//! [`TRANSITIONS`]. Transitions are pure: they look at the current tier and
//! the event payload and say what should change. [`reconcile`] then applies
//! the change through the store. Deliveries are at-least-once, so applying
//! the same event twice must land on the same state.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::AppError;
use crate::models::SubscriptionTier;
use crate::state::AppState;
use crate::store::UserUpdate;

/// Inbound event envelope. Only the fields the reconciler reads.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    CheckoutCompleted,
    PaymentSucceeded,
    PaymentFailed,
}

impl EventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer.subscription.created" => Some(EventKind::SubscriptionCreated),
            "customer.subscription.updated" => Some(EventKind::SubscriptionUpdated),
            "customer.subscription.deleted" => Some(EventKind::SubscriptionDeleted),
            "checkout.session.completed" => Some(EventKind::CheckoutCompleted),
            "invoice.payment_succeeded" => Some(EventKind::PaymentSucceeded),
            "invoice.payment_failed" => Some(EventKind::PaymentFailed),
            _ => None,
        }
    }

    fn is_payment(&self) -> bool {
        matches!(self, EventKind::PaymentSucceeded | EventKind::PaymentFailed)
    }
}

#[derive(Debug, Deserialize)]
struct PriceRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: PriceRef,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    status: String,
    items: SubscriptionItems,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    customer: Option<String>,
    subscription: Option<String>,
}

/// Static price id -> tier mapping.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    tiers: HashMap<String, SubscriptionTier>,
}

impl PriceTable {
    pub fn from_config(cfg: &BillingConfig) -> Self {
        let mut tiers = HashMap::new();
        if let Some(id) = &cfg.basic_price_id {
            tiers.insert(id.clone(), SubscriptionTier::Basic);
        }
        if let Some(id) = &cfg.premium_price_id {
            tiers.insert(id.clone(), SubscriptionTier::Premium);
        }
        Self { tiers }
    }

    /// Unknown prices fall back to the free tier.
    pub fn tier_for(&self, price_id: &str) -> SubscriptionTier {
        self.tiers.get(price_id).copied().unwrap_or_default()
    }

    pub fn price_for(&self, tier: SubscriptionTier) -> Option<&str> {
        self.tiers
            .iter()
            .find(|(_, t)| **t == tier)
            .map(|(id, _)| id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetTier(SubscriptionTier),
    AttachCustomer(String),
}

pub type Transition = fn(SubscriptionTier, &Value, &PriceTable) -> Result<Effect, String>;

pub const TRANSITIONS: &[(EventKind, Transition)] = &[
    (EventKind::SubscriptionCreated, subscription_changed),
    (EventKind::SubscriptionUpdated, subscription_changed),
    (EventKind::SubscriptionDeleted, subscription_canceled),
    (EventKind::CheckoutCompleted, checkout_completed),
];

fn decode<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, String> {
    T::deserialize(payload).map_err(|e| e.to_string())
}

fn subscription_changed(
    _current: SubscriptionTier,
    payload: &Value,
    prices: &PriceTable,
) -> Result<Effect, String> {
    let sub: SubscriptionObject = decode(payload)?;
    if sub.status != "active" {
        return Ok(Effect::SetTier(SubscriptionTier::Free));
    }
    let tier = sub
        .items
        .data
        .first()
        .map(|item| prices.tier_for(&item.price.id))
        .unwrap_or_default();
    Ok(Effect::SetTier(tier))
}

fn subscription_canceled(
    _current: SubscriptionTier,
    _payload: &Value,
    _prices: &PriceTable,
) -> Result<Effect, String> {
    Ok(Effect::SetTier(SubscriptionTier::Free))
}

fn checkout_completed(
    _current: SubscriptionTier,
    payload: &Value,
    _prices: &PriceTable,
) -> Result<Effect, String> {
    let session: CheckoutSessionObject = decode(payload)?;
    session
        .customer
        .map(Effect::AttachCustomer)
        .ok_or_else(|| "checkout session has no customer".to_string())
}

fn transition_for(kind: EventKind) -> Option<Transition> {
    TRANSITIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, t)| *t)
}

fn user_id_of(payload: &Value) -> Result<Uuid, AppError> {
    let raw = payload
        .get("metadata")
        .and_then(|m| m.get("userId"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::ProviderState("no userId in event metadata".into()))?;
    Uuid::parse_str(raw)
        .map_err(|_| AppError::ProviderState(format!("userId {raw:?} is not a uuid")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    TierChanged {
        user_id: Uuid,
        from: SubscriptionTier,
        to: SubscriptionTier,
    },
    CustomerAttached {
        user_id: Uuid,
    },
    Unchanged {
        user_id: Uuid,
    },
    /// Payment notifications: logged, no state change.
    Recorded,
    Ignored {
        reason: String,
    },
}

async fn apply(
    st: &AppState,
    kind: EventKind,
    event: &BillingEvent,
) -> Result<ReconcileOutcome, AppError> {
    let payload = &event.data.object;

    if kind.is_payment() {
        let invoice: InvoiceObject = decode(payload).map_err(AppError::ProviderState)?;
        info!(
            event_id = %event.id,
            kind = ?kind,
            customer = invoice.customer.as_deref().unwrap_or("-"),
            subscription = invoice.subscription.as_deref().unwrap_or("-"),
            "payment notification"
        );
        return Ok(ReconcileOutcome::Recorded);
    }

    let Some(transition) = transition_for(kind) else {
        return Ok(ReconcileOutcome::Ignored {
            reason: format!("no transition for {kind:?}"),
        });
    };
    let user_id = user_id_of(payload)?;
    let user = st
        .store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))?;

    let effect = transition(user.subscription_tier, payload, &st.prices)
        .map_err(AppError::ProviderState)?;

    match effect {
        Effect::SetTier(to) if to == user.subscription_tier => {
            Ok(ReconcileOutcome::Unchanged { user_id })
        }
        Effect::SetTier(to) => {
            st.store
                .update_user(
                    user_id,
                    UserUpdate {
                        subscription_tier: Some(to),
                        ..Default::default()
                    },
                )
                .await?;
            info!(%user_id, from = %user.subscription_tier, %to, "subscription tier updated");
            Ok(ReconcileOutcome::TierChanged {
                user_id,
                from: user.subscription_tier,
                to,
            })
        }
        Effect::AttachCustomer(customer_id) => {
            if st
                .store
                .set_billing_customer_if_absent(user_id, &customer_id)
                .await?
            {
                info!(%user_id, "billing customer attached from checkout");
                Ok(ReconcileOutcome::CustomerAttached { user_id })
            } else {
                Ok(ReconcileOutcome::Unchanged { user_id })
            }
        }
    }
}

/// Applies one billing event. Never fails: anything that cannot be applied
/// is logged and reported as [`ReconcileOutcome::Ignored`].
#[instrument(skip(st, event), fields(event_id = %event.id, kind = %event.kind))]
pub async fn reconcile(st: &AppState, event: &BillingEvent) -> ReconcileOutcome {
    let Some(kind) = EventKind::parse(&event.kind) else {
        info!("unhandled billing event type");
        return ReconcileOutcome::Ignored {
            reason: format!("unhandled event type {}", event.kind),
        };
    };

    match apply(st, kind, event).await {
        Ok(outcome) => outcome,
        Err(e @ (AppError::ProviderState(_) | AppError::NotFound(_))) => {
            warn!(error = %e, "billing event dropped");
            ReconcileOutcome::Ignored {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            error!(error = %e, "billing event could not be applied");
            ReconcileOutcome::Ignored {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::testing::{harness, seed_user, BASIC_PRICE, PREMIUM_PRICE};
    use crate::store::memory::MemoryStore;
    use crate::store::ProfileStore;

    fn event(kind: &str, object: Value) -> BillingEvent {
        BillingEvent {
            id: "evt_test".into(),
            kind: kind.into(),
            data: EventData { object },
        }
    }

    fn subscription(user_id: Uuid, status: &str, price: &str) -> Value {
        json!({
            "id": "sub_1",
            "status": status,
            "metadata": { "userId": user_id.to_string() },
            "items": { "data": [ { "price": { "id": price } } ] }
        })
    }

    async fn tier_of(store: &MemoryStore, user_id: Uuid) -> SubscriptionTier {
        store
            .get_user_by_id(user_id)
            .await
            .unwrap()
            .unwrap()
            .subscription_tier
    }

    #[test]
    fn price_table_maps_configured_prices() {
        let prices = PriceTable::from_config(&crate::state::testing::test_config().billing);
        assert_eq!(prices.tier_for(BASIC_PRICE), SubscriptionTier::Basic);
        assert_eq!(prices.tier_for(PREMIUM_PRICE), SubscriptionTier::Premium);
        assert_eq!(prices.tier_for("price_unknown"), SubscriptionTier::Free);
        assert_eq!(prices.price_for(SubscriptionTier::Premium), Some(PREMIUM_PRICE));
    }

    #[test]
    fn inactive_subscription_maps_to_free() {
        let prices = PriceTable::from_config(&crate::state::testing::test_config().billing);
        let payload = subscription(Uuid::nil(), "past_due", PREMIUM_PRICE);
        assert_eq!(
            subscription_changed(SubscriptionTier::Premium, &payload, &prices),
            Ok(Effect::SetTier(SubscriptionTier::Free))
        );
    }

    #[test]
    fn every_tier_affecting_kind_has_a_transition() {
        for kind in [
            EventKind::SubscriptionCreated,
            EventKind::SubscriptionUpdated,
            EventKind::SubscriptionDeleted,
            EventKind::CheckoutCompleted,
        ] {
            assert!(transition_for(kind).is_some(), "{kind:?}");
        }
        assert!(transition_for(EventKind::PaymentFailed).is_none());
    }

    #[tokio::test]
    async fn active_subscription_sets_mapped_tier() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        let ev = event(
            "customer.subscription.created",
            subscription(user_id, "active", PREMIUM_PRICE),
        );

        let outcome = reconcile(&h.state, &ev).await;
        assert_eq!(
            outcome,
            ReconcileOutcome::TierChanged {
                user_id,
                from: SubscriptionTier::Free,
                to: SubscriptionTier::Premium
            }
        );
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Premium);
    }

    #[tokio::test]
    async fn unmapped_price_downgrades_to_free() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        reconcile(
            &h.state,
            &event(
                "customer.subscription.updated",
                subscription(user_id, "active", BASIC_PRICE),
            ),
        )
        .await;
        reconcile(
            &h.state,
            &event(
                "customer.subscription.updated",
                subscription(user_id, "active", "price_retired"),
            ),
        )
        .await;
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn replayed_deletion_is_idempotent() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        reconcile(
            &h.state,
            &event(
                "customer.subscription.created",
                subscription(user_id, "active", BASIC_PRICE),
            ),
        )
        .await;

        let deleted = event(
            "customer.subscription.deleted",
            subscription(user_id, "canceled", BASIC_PRICE),
        );
        let first = reconcile(&h.state, &deleted).await;
        assert!(matches!(first, ReconcileOutcome::TierChanged { to: SubscriptionTier::Free, .. }));
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Free);

        let second = reconcile(&h.state, &deleted).await;
        assert_eq!(second, ReconcileOutcome::Unchanged { user_id });
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn checkout_does_not_overwrite_existing_customer() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        h.store
            .set_billing_customer_if_absent(user_id, "cus_original")
            .await
            .unwrap();

        let ev = event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "customer": "cus_other",
                "metadata": { "userId": user_id.to_string() }
            }),
        );
        assert_eq!(reconcile(&h.state, &ev).await, ReconcileOutcome::Unchanged { user_id });
        let user = h.store.get_user_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.billing_customer_id.as_deref(), Some("cus_original"));
    }

    #[tokio::test]
    async fn checkout_attaches_customer_when_absent() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        let ev = event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "customer": "cus_new",
                "metadata": { "userId": user_id.to_string() }
            }),
        );
        assert_eq!(
            reconcile(&h.state, &ev).await,
            ReconcileOutcome::CustomerAttached { user_id }
        );
        assert_eq!(
            reconcile(&h.state, &ev).await,
            ReconcileOutcome::Unchanged { user_id }
        );
        let user = h.store.get_user_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.billing_customer_id.as_deref(), Some("cus_new"));
    }

    #[tokio::test]
    async fn missing_user_metadata_is_a_no_op() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        let ev = event(
            "customer.subscription.created",
            json!({
                "id": "sub_1",
                "status": "active",
                "metadata": {},
                "items": { "data": [ { "price": { "id": PREMIUM_PRICE } } ] }
            }),
        );
        assert!(matches!(
            reconcile(&h.state, &ev).await,
            ReconcileOutcome::Ignored { .. }
        ));
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn unknown_user_and_unknown_type_are_ignored() {
        let h = harness();
        let ev = event(
            "customer.subscription.created",
            subscription(Uuid::new_v4(), "active", BASIC_PRICE),
        );
        assert!(matches!(
            reconcile(&h.state, &ev).await,
            ReconcileOutcome::Ignored { .. }
        ));
        let ev = event("customer.created", json!({}));
        assert!(matches!(
            reconcile(&h.state, &ev).await,
            ReconcileOutcome::Ignored { .. }
        ));
    }

    #[tokio::test]
    async fn payment_events_are_recorded_without_tier_change() {
        let h = harness();
        let user_id = seed_user(&h.store).await;
        let ev = event(
            "invoice.payment_failed",
            json!({ "id": "in_1", "customer": "cus_1", "subscription": "sub_1" }),
        );
        assert_eq!(reconcile(&h.state, &ev).await, ReconcileOutcome::Recorded);
        assert_eq!(tier_of(&h.store, user_id).await, SubscriptionTier::Free);
    }
}
