use std::sync::Mutex;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    NewMeal, NewPlan, NewRecipe, NewUser, ProfileStore, ProgressLogPatch, StoreConflict, UserUpdate,
};
use crate::models::{DietPlan, Meal, ProgressLog, Recipe, UserProfile};

#[derive(Default)]
struct Tables {
    users: Vec<UserProfile>,
    plans: Vec<DietPlan>,
    recipes: Vec<Recipe>,
    meals: Vec<Meal>,
    logs: Vec<ProgressLog>,
}

/// In-process store. One lock over all tables, so every method is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plans_for(&self, user_id: Uuid) -> Vec<DietPlan> {
        let t = self.tables.lock().unwrap();
        t.plans.iter().filter(|p| p.user_id == user_id).cloned().collect()
    }

    pub fn logs_for(&self, user_id: Uuid) -> Vec<ProgressLog> {
        let t = self.tables.lock().unwrap();
        t.logs.iter().filter(|l| l.user_id == user_id).cloned().collect()
    }

    pub fn recipe_count(&self) -> usize {
        self.tables.lock().unwrap().recipes.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<UserProfile> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(StoreConflict::DuplicateEmail.into());
        }
        let now = OffsetDateTime::now_utc();
        let profile = UserProfile {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            age: user.age,
            weight: user.weight,
            height: user.height,
            activity_level: user.activity_level,
            dietary_preferences: user.dietary_preferences,
            health_goals: user.health_goals,
            subscription_tier: user.subscription_tier,
            billing_customer_id: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(profile.clone());
        Ok(profile)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserProfile>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        update: UserUpdate,
    ) -> anyhow::Result<Option<UserProfile>> {
        let mut t = self.tables.lock().unwrap();
        if let Some(email) = &update.email {
            if t.users.iter().any(|u| u.id != user_id && &u.email == email) {
                return Err(StoreConflict::DuplicateEmail.into());
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        if let Some(v) = update.name {
            user.name = v;
        }
        if let Some(v) = update.email {
            user.email = v;
        }
        if let Some(v) = update.age {
            user.age = v;
        }
        if let Some(v) = update.weight {
            user.weight = v;
        }
        if let Some(v) = update.height {
            user.height = v;
        }
        if let Some(v) = update.activity_level {
            user.activity_level = v;
        }
        if let Some(v) = update.dietary_preferences {
            user.dietary_preferences = v;
        }
        if let Some(v) = update.health_goals {
            user.health_goals = v;
        }
        if let Some(v) = update.subscription_tier {
            user.subscription_tier = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_billing_customer_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if user.billing_customer_id.is_none() => {
                user.billing_customer_id = Some(customer_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_plan(&self, plan: NewPlan) -> anyhow::Result<DietPlan> {
        let mut t = self.tables.lock().unwrap();
        if !t.users.iter().any(|u| u.id == plan.user_id) {
            anyhow::bail!("user {} does not exist", plan.user_id);
        }
        let has_active = t
            .plans
            .iter()
            .any(|p| p.user_id == plan.user_id && p.is_active);
        if has_active && !plan.replace_existing {
            return Err(StoreConflict::ActivePlanExists.into());
        }
        for p in t.plans.iter_mut().filter(|p| p.user_id == plan.user_id) {
            p.is_active = false;
        }
        let now = OffsetDateTime::now_utc();
        let created = DietPlan {
            id: Uuid::new_v4(),
            user_id: plan.user_id,
            calorie_target: plan.calorie_target,
            macro_targets: plan.macro_targets,
            is_active: true,
            generated_date: now.date(),
            created_at: now,
        };
        t.plans.push(created.clone());
        Ok(created)
    }

    async fn get_active_plan(&self, user_id: Uuid) -> anyhow::Result<Option<DietPlan>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .plans
            .iter()
            .find(|p| p.user_id == user_id && p.is_active)
            .cloned())
    }

    async fn create_recipe(&self, recipe: NewRecipe) -> anyhow::Result<Recipe> {
        let mut t = self.tables.lock().unwrap();
        if let Some(ext) = recipe.external_id.as_deref() {
            let existing = t
                .recipes
                .iter()
                .find(|r| r.external_id.as_deref() == Some(ext));
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }
        let created = Recipe {
            id: Uuid::new_v4(),
            name: recipe.name,
            description: recipe.description,
            ingredients: recipe.ingredients,
            instructions: recipe.instructions,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            nutrition: recipe.nutrition,
            source: recipe.source,
            external_id: recipe.external_id,
            created_at: OffsetDateTime::now_utc(),
        };
        t.recipes.push(created.clone());
        Ok(created)
    }

    async fn find_recipe_by_external_id(
        &self,
        external_id: &str,
    ) -> anyhow::Result<Option<Recipe>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .recipes
            .iter()
            .find(|r| r.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<Meal> {
        let mut t = self.tables.lock().unwrap();
        let created = Meal {
            id: Uuid::new_v4(),
            plan_id: meal.plan_id,
            slot: meal.slot,
            recipe_id: meal.recipe_id,
            name: meal.name,
            calories: meal.calories,
            macros: meal.macros,
            preparation_time: meal.preparation_time,
            created_at: OffsetDateTime::now_utc(),
        };
        t.meals.push(created.clone());
        Ok(created)
    }

    async fn get_meals_by_plan(&self, plan_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let t = self.tables.lock().unwrap();
        let mut meals: Vec<Meal> = t
            .meals
            .iter()
            .filter(|m| m.plan_id == plan_id)
            .cloned()
            .collect();
        // stable sort keeps insertion order within a slot
        meals.sort_by_key(|m| m.slot);
        Ok(meals)
    }

    async fn upsert_progress_log(
        &self,
        user_id: Uuid,
        log_date: Date,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<ProgressLog> {
        let mut t = self.tables.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        if let Some(log) = t
            .logs
            .iter_mut()
            .find(|l| l.user_id == user_id && l.log_date == log_date)
        {
            if let Some(v) = patch.weight {
                log.weight = v;
            }
            if let Some(v) = patch.food_consumed {
                log.food_consumed = v;
            }
            if let Some(v) = patch.adherence_score {
                log.adherence_score = v;
            }
            if let Some(v) = patch.notes {
                log.notes = Some(v);
            }
            log.updated_at = now;
            return Ok(log.clone());
        }
        let Some(weight) = patch.weight else {
            anyhow::bail!("weight is required for a new log");
        };
        let Some(adherence_score) = patch.adherence_score else {
            anyhow::bail!("adherence score is required for a new log");
        };
        let created = ProgressLog {
            id: Uuid::new_v4(),
            user_id,
            log_date,
            weight,
            food_consumed: patch.food_consumed.unwrap_or_default(),
            adherence_score,
            notes: patch.notes,
            created_at: now,
            updated_at: now,
        };
        t.logs.push(created.clone());
        Ok(created)
    }

    async fn update_progress_log(
        &self,
        log_id: Uuid,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<Option<ProgressLog>> {
        let mut t = self.tables.lock().unwrap();
        let Some(log) = t.logs.iter_mut().find(|l| l.id == log_id) else {
            return Ok(None);
        };
        if let Some(v) = patch.weight {
            log.weight = v;
        }
        if let Some(v) = patch.food_consumed {
            log.food_consumed = v;
        }
        if let Some(v) = patch.adherence_score {
            log.adherence_score = v;
        }
        if let Some(v) = patch.notes {
            log.notes = Some(v);
        }
        log.updated_at = OffsetDateTime::now_utc();
        Ok(Some(log.clone()))
    }

    async fn get_log_by_date(
        &self,
        user_id: Uuid,
        log_date: Date,
    ) -> anyhow::Result<Option<ProgressLog>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .logs
            .iter()
            .find(|l| l.user_id == user_id && l.log_date == log_date)
            .cloned())
    }

    async fn get_logs_in_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<ProgressLog>> {
        let t = self.tables.lock().unwrap();
        let mut logs: Vec<ProgressLog> = t
            .logs
            .iter()
            .filter(|l| l.user_id == user_id && l.log_date >= start && l.log_date <= end)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.log_date);
        Ok(logs)
    }
}
