use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::materializer::materialize;
use crate::error::AppError;
use crate::models::{DietPlan, Meal, MealSlot, UserProfile};
use crate::recommendations::bounded;
use crate::state::AppState;
use crate::store::NewPlan;

/// Suggestions materialized per slot. Extra suggestions are dropped.
pub const SUGGESTIONS_PER_SLOT: usize = 2;

const ACTIVE_PLAN_EXISTS: &str =
    "user already has an active diet plan; set regenerate=true to create a new one";

pub const NARRATION_FALLBACK: &str =
    "Your personalized nutrition plan is designed to help you achieve your health goals.";

/// What happened to one meal slot during generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOutcome {
    pub slot: MealSlot,
    pub meals_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SlotOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PlanGeneration {
    pub plan: DietPlan,
    pub meals: Vec<Meal>,
    pub explanation: String,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
    pub slots: Vec<SlotOutcome>,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct ActivePlan {
    pub plan: DietPlan,
    pub meals: Vec<Meal>,
    pub explanation: String,
}

async fn load_profile(st: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    st.store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}

/// Builds a new active plan for the user.
///
/// A failed targets call aborts before anything is written. After the plan
/// row exists, each slot is filled independently and a failing slot only
/// costs its own meals; the per-slot results are returned alongside.
#[instrument(skip(st))]
pub async fn generate_plan(
    st: &AppState,
    user_id: Uuid,
    regenerate: bool,
) -> Result<PlanGeneration, AppError> {
    let profile = load_profile(st, user_id).await?;

    // early exit that saves a targets call; create_plan re-checks under its lock
    if !regenerate && st.store.get_active_plan(user_id).await?.is_some() {
        return Err(AppError::Conflict(ACTIVE_PLAN_EXISTS.into()));
    }

    let limit = st.config.recommendations.timeout();
    let targets = bounded(limit, st.engine.recommend_targets(&profile))
        .await
        .map_err(|e| {
            error!(%user_id, error = %e, "nutrition targets unavailable");
            AppError::from(e)
        })?;

    let plan = st
        .store
        .create_plan(NewPlan {
            user_id,
            calorie_target: targets.calorie_target,
            macro_targets: targets.macro_targets,
            replace_existing: regenerate,
        })
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                warn!(%user_id, "concurrent generation created a plan first");
                AppError::Conflict(ACTIVE_PLAN_EXISTS.into())
            }
            other => other,
        })?;

    // join_all keeps slot order regardless of completion order
    let filled = join_all(
        MealSlot::PRIMARY
            .iter()
            .map(|&slot| fill_slot(st, &profile, &plan, slot, limit)),
    )
    .await;

    let mut meals = Vec::new();
    let mut slots = Vec::with_capacity(filled.len());
    for (slot_meals, outcome) in filled {
        meals.extend(slot_meals);
        slots.push(outcome);
    }
    let degraded = slots.iter().any(|s| !s.succeeded());

    info!(
        plan_id = %plan.id,
        meals = meals.len(),
        degraded,
        "diet plan generated"
    );

    Ok(PlanGeneration {
        plan,
        meals,
        explanation: targets.explanation,
        tips: targets.tips,
        warnings: targets.warnings,
        slots,
        degraded,
    })
}

async fn fill_slot(
    st: &AppState,
    profile: &UserProfile,
    plan: &DietPlan,
    slot: MealSlot,
    limit: Duration,
) -> (Vec<Meal>, SlotOutcome) {
    let mut meals = Vec::new();
    let res: anyhow::Result<()> = async {
        let suggestions = bounded(
            limit,
            st.engine.recommend_meals(profile, slot, plan.calorie_target),
        )
        .await?;
        for s in suggestions.iter().take(SUGGESTIONS_PER_SLOT) {
            let (_, meal) = materialize(st, plan.id, s, slot).await?;
            meals.push(meal);
        }
        Ok(())
    }
    .await;

    let error = match res {
        Ok(()) => None,
        Err(e) => {
            warn!(plan_id = %plan.id, %slot, error = %e, "meal slot skipped");
            Some(e.to_string())
        }
    };
    let outcome = SlotOutcome {
        slot,
        meals_created: meals.len(),
        error,
    };
    (meals, outcome)
}

/// Active plan with its meals. The explanation is narrated on every read and
/// falls back to a fixed sentence when narration fails.
#[instrument(skip(st))]
pub async fn get_active_plan(st: &AppState, user_id: Uuid) -> Result<ActivePlan, AppError> {
    let profile = load_profile(st, user_id).await?;
    let plan = st
        .store
        .get_active_plan(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("active diet plan".into()))?;
    let meals = st.store.get_meals_by_plan(plan.id).await?;

    let limit = st.config.recommendations.timeout();
    let explanation = match bounded(limit, st.engine.narrate_plan(&profile, &plan)).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => NARRATION_FALLBACK.to_string(),
        Err(e) => {
            warn!(%user_id, error = %e, "plan narration failed");
            NARRATION_FALLBACK.to_string()
        }
    };

    Ok(ActivePlan {
        plan,
        meals,
        explanation,
    })
}
