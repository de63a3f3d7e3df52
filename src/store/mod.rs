//! Durable store for profiles, plans, recipes, meals and progress logs.
//!
//! Everything the services persist goes through [`ProfileStore`]. The
//! Postgres implementation is used in production; tests run against the
//! in-memory one.

#[cfg(test)]
pub mod memory;
pub mod postgres;
mod repo_types;

use std::collections::BTreeSet;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::models::{
    ActivityLevel, DietPlan, Macros, Meal, MealSlot, Nutrition, ProgressLog, Recipe,
    RecipeSource, SubscriptionTier, UserProfile,
};

pub use postgres::PgStore;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub weight: f64,
    pub height: f64,
    pub activity_level: ActivityLevel,
    pub dietary_preferences: BTreeSet<String>,
    pub health_goals: BTreeSet<String>,
    pub subscription_tier: SubscriptionTier,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub dietary_preferences: Option<BTreeSet<String>>,
    pub health_goals: Option<BTreeSet<String>>,
    pub subscription_tier: Option<SubscriptionTier>,
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub user_id: Uuid,
    pub calorie_target: i32,
    pub macro_targets: Macros,
    /// When false, an existing active plan makes the insert fail with
    /// [`StoreConflict::ActivePlanExists`] instead of being deactivated.
    pub replace_existing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: i32,
    pub cook_time: i32,
    pub nutrition: Nutrition,
    pub source: RecipeSource,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub plan_id: Uuid,
    pub slot: MealSlot,
    pub recipe_id: Uuid,
    pub name: String,
    pub calories: i32,
    pub macros: Macros,
    pub preparation_time: i32,
}

/// Fields supplied to a progress upsert. Omitted fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressLogPatch {
    pub weight: Option<f64>,
    pub food_consumed: Option<Vec<String>>,
    pub adherence_score: Option<i32>,
    pub notes: Option<String>,
}

/// Uniqueness violations detected inside the store. Returned wrapped in
/// `anyhow::Error`; the service layer turns them into conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreConflict {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("user already has an active diet plan")]
    ActivePlanExists,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fails with [`StoreConflict::DuplicateEmail`] when the email is taken.
    async fn create_user(&self, user: NewUser) -> anyhow::Result<UserProfile>;
    async fn get_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserProfile>>;
    async fn update_user(
        &self,
        user_id: Uuid,
        update: UserUpdate,
    ) -> anyhow::Result<Option<UserProfile>>;

    /// Stores the billing customer reference only when none is set yet.
    /// Returns `true` when the value was written.
    async fn set_billing_customer_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> anyhow::Result<bool>;

    /// Checks for, deactivates and replaces the user's active plan as one
    /// unit, so two concurrent calls cannot both see "no active plan".
    async fn create_plan(&self, plan: NewPlan) -> anyhow::Result<DietPlan>;
    async fn get_active_plan(&self, user_id: Uuid) -> anyhow::Result<Option<DietPlan>>;

    /// Inserts a recipe. When another recipe already holds the same external
    /// id, that recipe is returned instead.
    async fn create_recipe(&self, recipe: NewRecipe) -> anyhow::Result<Recipe>;
    async fn find_recipe_by_external_id(&self, external_id: &str)
        -> anyhow::Result<Option<Recipe>>;

    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<Meal>;
    /// Meals ordered by slot, then creation order.
    async fn get_meals_by_plan(&self, plan_id: Uuid) -> anyhow::Result<Vec<Meal>>;

    async fn upsert_progress_log(
        &self,
        user_id: Uuid,
        log_date: Date,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<ProgressLog>;
    /// Partial update of one log by id. `None` when no such log exists.
    async fn update_progress_log(
        &self,
        log_id: Uuid,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<Option<ProgressLog>>;
    async fn get_log_by_date(
        &self,
        user_id: Uuid,
        log_date: Date,
    ) -> anyhow::Result<Option<ProgressLog>>;
    /// Logs with `start <= log_date <= end`, ascending by date.
    async fn get_logs_in_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<ProgressLog>>;
}
