use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::models::{
    DietPlan, Macros, Meal, Nutrition, ProgressLog, Recipe, UserProfile,
};

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub weight: f64,
    pub height: f64,
    pub activity_level: String,
    pub dietary_preferences: Vec<String>,
    pub health_goals: Vec<String>,
    pub subscription_tier: String,
    pub billing_customer_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            age: r.age,
            weight: r.weight,
            height: r.height,
            activity_level: r.activity_level.parse()?,
            dietary_preferences: r.dietary_preferences.into_iter().collect(),
            health_goals: r.health_goals.into_iter().collect(),
            subscription_tier: r.subscription_tier.parse()?,
            billing_customer_id: r.billing_customer_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub calorie_target: i32,
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fat_g: i32,
    pub is_active: bool,
    pub generated_date: Date,
    pub created_at: OffsetDateTime,
}

impl From<PlanRow> for DietPlan {
    fn from(r: PlanRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            calorie_target: r.calorie_target,
            macro_targets: Macros {
                protein: r.protein_g,
                carbs: r.carbs_g,
                fat: r.fat_g,
            },
            is_active: r.is_active,
            generated_date: r.generated_date,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: i32,
    pub cook_time: i32,
    pub calories: i32,
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fat_g: i32,
    pub source: String,
    pub external_id: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = anyhow::Error;

    fn try_from(r: RecipeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            description: r.description,
            ingredients: r.ingredients,
            instructions: r.instructions,
            prep_time: r.prep_time,
            cook_time: r.cook_time,
            nutrition: Nutrition {
                calories: r.calories,
                protein: r.protein_g,
                carbs: r.carbs_g,
                fat: r.fat_g,
            },
            source: r.source.parse()?,
            external_id: r.external_id,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub meal_type: String,
    pub recipe_id: Uuid,
    pub name: String,
    pub calories: i32,
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fat_g: i32,
    pub preparation_time: i32,
    pub created_at: OffsetDateTime,
}

impl TryFrom<MealRow> for Meal {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            plan_id: r.plan_id,
            slot: r.meal_type.parse()?,
            recipe_id: r.recipe_id,
            name: r.name,
            calories: r.calories,
            macros: Macros {
                protein: r.protein_g,
                carbs: r.carbs_g,
                fat: r.fat_g,
            },
            preparation_time: r.preparation_time,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ProgressLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub log_date: Date,
    pub weight: f64,
    pub food_consumed: Vec<String>,
    pub adherence_score: i32,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ProgressLogRow> for ProgressLog {
    fn from(r: ProgressLogRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            log_date: r.log_date,
            weight: r.weight,
            food_consumed: r.food_consumed,
            adherence_score: r.adherence_score,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
