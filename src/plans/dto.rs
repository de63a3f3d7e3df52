use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services::{ActivePlan, PlanGeneration, SlotOutcome};
use crate::models::{DietPlan, Macros, Meal, MealSlot};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlanQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub calorie_target: i32,
    pub macro_targets: Macros,
    pub is_active: bool,
    pub generated_date: Date,
    pub created_at: OffsetDateTime,
}

impl From<DietPlan> for PlanView {
    fn from(p: DietPlan) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            calorie_target: p.calorie_target,
            macro_targets: p.macro_targets,
            is_active: p.is_active,
            generated_date: p.generated_date,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealView {
    pub id: Uuid,
    pub diet_plan_id: Uuid,
    pub meal_type: MealSlot,
    pub recipe_id: Uuid,
    pub name: String,
    pub calories: i32,
    pub macros: Macros,
    pub preparation_time: i32,
}

impl From<Meal> for MealView {
    fn from(m: Meal) -> Self {
        Self {
            id: m.id,
            diet_plan_id: m.plan_id,
            meal_type: m.slot,
            recipe_id: m.recipe_id,
            name: m.name,
            calories: m.calories,
            macros: m.macros,
            preparation_time: m.preparation_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlanResponse {
    pub diet_plan: PlanView,
    pub meals: Vec<MealView>,
    pub explanation: String,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
    pub slots: Vec<SlotOutcome>,
    pub degraded: bool,
}

impl From<PlanGeneration> for GeneratedPlanResponse {
    fn from(g: PlanGeneration) -> Self {
        Self {
            diet_plan: g.plan.into(),
            meals: g.meals.into_iter().map(MealView::from).collect(),
            explanation: g.explanation,
            tips: g.tips,
            warnings: g.warnings,
            slots: g.slots,
            degraded: g.degraded,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlanResponse {
    pub diet_plan: PlanView,
    pub meals: Vec<MealView>,
    pub explanation: String,
}

impl From<ActivePlan> for ActivePlanResponse {
    fn from(a: ActivePlan) -> Self {
        Self {
            diet_plan: a.plan.into(),
            meals: a.meals.into_iter().map(MealView::from).collect(),
            explanation: a.explanation,
        }
    }
}
