use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{MealRow, PlanRow, ProgressLogRow, RecipeRow, UserRow};
use super::{
    NewMeal, NewPlan, NewRecipe, NewUser, ProfileStore, ProgressLogPatch, StoreConflict, UserUpdate,
};
use crate::models::{DietPlan, Meal, ProgressLog, Recipe, UserProfile};

const USER_COLUMNS: &str = "id, name, email, age, weight, height, activity_level, \
     dietary_preferences, health_goals, subscription_tier, billing_customer_id, \
     created_at, updated_at";

const PLAN_COLUMNS: &str =
    "id, user_id, calorie_target, protein_g, carbs_g, fat_g, is_active, generated_date, created_at";

const RECIPE_COLUMNS: &str = "id, name, description, ingredients, instructions, prep_time, \
     cook_time, calories, protein_g, carbs_g, fat_g, source, external_id, created_at";

const MEAL_COLUMNS: &str = "id, plan_id, meal_type, recipe_id, name, calories, protein_g, \
     carbs_g, fat_g, preparation_time, created_at";

const LOG_COLUMNS: &str = "id, user_id, log_date, weight, food_consumed, adherence_score, \
     notes, created_at, updated_at";

/// Maps a unique-index violation to the matching conflict; anything else
/// keeps its context.
fn unique_or(e: sqlx::Error, conflict: StoreConflict, what: &'static str) -> anyhow::Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict.into(),
        _ => anyhow::Error::new(e).context(what),
    }
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<UserProfile> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, age, weight, height, activity_level,
                               dietary_preferences, health_goals, subscription_tier)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.age)
        .bind(user.weight)
        .bind(user.height)
        .bind(user.activity_level.as_str())
        .bind(user.dietary_preferences.into_iter().collect::<Vec<_>>())
        .bind(user.health_goals.into_iter().collect::<Vec<_>>())
        .bind(user.subscription_tier.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_or(e, StoreConflict::DuplicateEmail, "insert user"))?;
        row.try_into()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get user by id")?;
        row.map(UserProfile::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("get user by email")?;
        row.map(UserProfile::try_from).transpose()
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        update: UserUpdate,
    ) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name                = COALESCE($2, name),
                   email               = COALESCE($3, email),
                   age                 = COALESCE($4, age),
                   weight              = COALESCE($5, weight),
                   height              = COALESCE($6, height),
                   activity_level      = COALESCE($7, activity_level),
                   dietary_preferences = COALESCE($8, dietary_preferences),
                   health_goals        = COALESCE($9, health_goals),
                   subscription_tier   = COALESCE($10, subscription_tier),
                   updated_at          = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.age)
        .bind(update.weight)
        .bind(update.height)
        .bind(update.activity_level.map(|a| a.as_str()))
        .bind(update.dietary_preferences.map(|p| p.into_iter().collect::<Vec<_>>()))
        .bind(update.health_goals.map(|g| g.into_iter().collect::<Vec<_>>()))
        .bind(update.subscription_tier.map(|t| t.as_str()))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| unique_or(e, StoreConflict::DuplicateEmail, "update user"))?;
        row.map(UserProfile::try_from).transpose()
    }

    async fn set_billing_customer_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET billing_customer_id = $2, updated_at = now()
             WHERE id = $1 AND billing_customer_id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(&self.db)
        .await
        .context("set billing customer")?;
        Ok(res.rows_affected() == 1)
    }

    async fn create_plan(&self, plan: NewPlan) -> anyhow::Result<DietPlan> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // Serializes concurrent generations for the same user.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(plan.user_id)
            .fetch_one(&mut *tx)
            .await
            .context("lock user row")?;

        if !plan.replace_existing {
            let active: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM diet_plans WHERE user_id = $1 AND is_active)",
            )
            .bind(plan.user_id)
            .fetch_one(&mut *tx)
            .await
            .context("check active plan")?;
            if active {
                return Err(StoreConflict::ActivePlanExists.into());
            }
        }

        let deactivated = sqlx::query(
            "UPDATE diet_plans SET is_active = FALSE WHERE user_id = $1 AND is_active",
        )
        .bind(plan.user_id)
        .execute(&mut *tx)
        .await
        .context("deactivate previous plans")?
        .rows_affected();

        let row = sqlx::query_as::<_, PlanRow>(&format!(
            r#"
            INSERT INTO diet_plans (user_id, calorie_target, protein_g, carbs_g, fat_g, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan.user_id)
        .bind(plan.calorie_target)
        .bind(plan.macro_targets.protein)
        .bind(plan.macro_targets.carbs)
        .bind(plan.macro_targets.fat)
        .fetch_one(&mut *tx)
        .await
        .context("insert plan")?;

        tx.commit().await.context("commit tx")?;
        debug!(user_id = %plan.user_id, plan_id = %row.id, deactivated, "plan activated");
        Ok(row.into())
    }

    async fn get_active_plan(&self, user_id: Uuid) -> anyhow::Result<Option<DietPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            "SELECT {PLAN_COLUMNS} FROM diet_plans WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get active plan")?;
        Ok(row.map(Into::into))
    }

    async fn create_recipe(&self, recipe: NewRecipe) -> anyhow::Result<Recipe> {
        let inserted = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            INSERT INTO recipes (name, description, ingredients, instructions, prep_time,
                                 cook_time, calories, protein_g, carbs_g, fat_g, source, external_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.ingredients)
        .bind(&recipe.instructions)
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.nutrition.calories)
        .bind(recipe.nutrition.protein)
        .bind(recipe.nutrition.carbs)
        .bind(recipe.nutrition.fat)
        .bind(recipe.source.as_str())
        .bind(&recipe.external_id)
        .fetch_optional(&self.db)
        .await
        .context("insert recipe")?;
        if let Some(row) = inserted {
            return row.try_into();
        }

        // NULL external ids never conflict, so a skipped insert always has one
        let external_id = recipe
            .external_id
            .as_deref()
            .context("recipe insert skipped without an external id")?;
        debug!(external_id, "recipe inserted concurrently; reusing it");
        self.find_recipe_by_external_id(external_id)
            .await?
            .context("conflicting recipe not found")
    }

    async fn find_recipe_by_external_id(
        &self,
        external_id: &str,
    ) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe by external id")?;
        row.map(Recipe::try_from).transpose()
    }

    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<Meal> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            INSERT INTO meals (plan_id, meal_type, recipe_id, name, calories,
                               protein_g, carbs_g, fat_g, preparation_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(meal.plan_id)
        .bind(meal.slot.as_str())
        .bind(meal.recipe_id)
        .bind(&meal.name)
        .bind(meal.calories)
        .bind(meal.macros.protein)
        .bind(meal.macros.carbs)
        .bind(meal.macros.fat)
        .bind(meal.preparation_time)
        .fetch_one(&self.db)
        .await
        .context("insert meal")?;
        row.try_into()
    }

    async fn get_meals_by_plan(&self, plan_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
              FROM meals
             WHERE plan_id = $1
             ORDER BY CASE meal_type
                        WHEN 'breakfast' THEN 0
                        WHEN 'lunch' THEN 1
                        WHEN 'dinner' THEN 2
                        ELSE 3
                      END,
                      created_at ASC
            "#
        ))
        .bind(plan_id)
        .fetch_all(&self.db)
        .await
        .context("list meals by plan")?;
        rows.into_iter().map(Meal::try_from).collect()
    }

    async fn upsert_progress_log(
        &self,
        user_id: Uuid,
        log_date: Date,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<ProgressLog> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM progress_logs WHERE user_id = $1 AND log_date = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(log_date)
        .fetch_optional(&mut *tx)
        .await
        .context("lock progress log")?;

        let row = match existing {
            Some((log_id,)) => sqlx::query_as::<_, ProgressLogRow>(&format!(
                r#"
                UPDATE progress_logs
                   SET weight          = COALESCE($2, weight),
                       food_consumed   = COALESCE($3, food_consumed),
                       adherence_score = COALESCE($4, adherence_score),
                       notes           = COALESCE($5, notes),
                       updated_at      = now()
                 WHERE id = $1
                RETURNING {LOG_COLUMNS}
                "#
            ))
            .bind(log_id)
            .bind(patch.weight)
            .bind(patch.food_consumed)
            .bind(patch.adherence_score)
            .bind(patch.notes)
            .fetch_one(&mut *tx)
            .await
            .context("update progress log")?,
            None => {
                let weight = patch.weight.context("weight is required for a new log")?;
                let adherence = patch
                    .adherence_score
                    .context("adherence score is required for a new log")?;
                // A concurrent insert for the same day folds into an update.
                sqlx::query_as::<_, ProgressLogRow>(&format!(
                    r#"
                    INSERT INTO progress_logs (user_id, log_date, weight, food_consumed,
                                               adherence_score, notes)
                    VALUES ($1, $2, $3, COALESCE($4, '{{}}'::TEXT[]), $5, $6)
                    ON CONFLICT (user_id, log_date) DO UPDATE
                       SET weight          = EXCLUDED.weight,
                           food_consumed   = COALESCE($4, progress_logs.food_consumed),
                           adherence_score = EXCLUDED.adherence_score,
                           notes           = COALESCE($6, progress_logs.notes),
                           updated_at      = now()
                    RETURNING {LOG_COLUMNS}
                    "#
                ))
                .bind(user_id)
                .bind(log_date)
                .bind(weight)
                .bind(patch.food_consumed)
                .bind(adherence)
                .bind(patch.notes)
                .fetch_one(&mut *tx)
                .await
                .context("insert progress log")?
            }
        };

        tx.commit().await.context("commit tx")?;
        Ok(row.into())
    }

    async fn update_progress_log(
        &self,
        log_id: Uuid,
        patch: ProgressLogPatch,
    ) -> anyhow::Result<Option<ProgressLog>> {
        let row = sqlx::query_as::<_, ProgressLogRow>(&format!(
            r#"
            UPDATE progress_logs
               SET weight          = COALESCE($2, weight),
                   food_consumed   = COALESCE($3, food_consumed),
                   adherence_score = COALESCE($4, adherence_score),
                   notes           = COALESCE($5, notes),
                   updated_at      = now()
             WHERE id = $1
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(log_id)
        .bind(patch.weight)
        .bind(patch.food_consumed)
        .bind(patch.adherence_score)
        .bind(patch.notes)
        .fetch_optional(&self.db)
        .await
        .context("update progress log by id")?;
        Ok(row.map(Into::into))
    }

    async fn get_log_by_date(
        &self,
        user_id: Uuid,
        log_date: Date,
    ) -> anyhow::Result<Option<ProgressLog>> {
        let row = sqlx::query_as::<_, ProgressLogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM progress_logs WHERE user_id = $1 AND log_date = $2"
        ))
        .bind(user_id)
        .bind(log_date)
        .fetch_optional(&self.db)
        .await
        .context("get progress log by date")?;
        Ok(row.map(Into::into))
    }

    async fn get_logs_in_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<ProgressLog>> {
        let rows = sqlx::query_as::<_, ProgressLogRow>(&format!(
            r#"
            SELECT {LOG_COLUMNS}
              FROM progress_logs
             WHERE user_id = $1 AND log_date >= $2 AND log_date <= $3
             ORDER BY log_date ASC
            "#
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await
        .context("list progress logs in range")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
