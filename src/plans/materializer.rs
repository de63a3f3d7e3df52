use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Macros, Meal, MealSlot, Nutrition, Recipe, RecipeSource};
use crate::recommendations::MealSuggestion;
use crate::state::AppState;
use crate::store::{NewMeal, NewRecipe};

/// Heuristics used to fill in what a suggestion does not carry.
///
/// The macro split and the cook-time offset are product policy, not
/// physiology. They only apply when the suggestion has no explicit breakdown.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterializePolicy {
    pub protein_pct: f64,
    pub carbs_pct: f64,
    pub fat_pct: f64,
    pub protein_kcal_per_g: f64,
    pub carbs_kcal_per_g: f64,
    pub fat_kcal_per_g: f64,
    /// Minutes subtracted from prep time to estimate cook time, floored at zero.
    pub cook_time_offset: i32,
}

impl Default for MaterializePolicy {
    fn default() -> Self {
        Self {
            protein_pct: 0.15,
            carbs_pct: 0.50,
            fat_pct: 0.35,
            protein_kcal_per_g: 4.0,
            carbs_kcal_per_g: 4.0,
            fat_kcal_per_g: 9.0,
            cook_time_offset: 10,
        }
    }
}

impl MaterializePolicy {
    pub fn estimate_macros(&self, calories: i32) -> Macros {
        let kcal = f64::from(calories);
        let grams = |pct: f64, per_g: f64| (kcal * pct / per_g).round() as i32;
        Macros {
            protein: grams(self.protein_pct, self.protein_kcal_per_g),
            carbs: grams(self.carbs_pct, self.carbs_kcal_per_g),
            fat: grams(self.fat_pct, self.fat_kcal_per_g),
        }
    }

    pub fn cook_time(&self, prep_time: i32) -> i32 {
        (prep_time - self.cook_time_offset).max(0)
    }
}

fn instructions(s: &MealSuggestion, slot: MealSlot) -> Vec<String> {
    let mut steps = vec![
        format!("Recipe suggestion generated for {slot}."),
        format!("Preparation time: {} minutes", s.prep_time),
        format!("Difficulty: {}", s.difficulty.as_str()),
        "Follow standard cooking practices and adjust ingredients to taste.".to_string(),
    ];
    steps.extend(s.benefits.iter().map(|b| format!("• {b}")));
    steps
}

/// Pure derivation of the recipe row for a suggestion.
pub fn derive_recipe(s: &MealSuggestion, slot: MealSlot, policy: &MaterializePolicy) -> NewRecipe {
    let macros = s
        .macros
        .unwrap_or_else(|| policy.estimate_macros(s.estimated_calories));
    let source = if s.external_id.is_some() {
        RecipeSource::ExternalSource
    } else {
        RecipeSource::Generated
    };
    NewRecipe {
        name: s.name.clone(),
        description: s.description.clone(),
        ingredients: s.ingredients.clone(),
        instructions: instructions(s, slot),
        prep_time: s.prep_time,
        cook_time: policy.cook_time(s.prep_time),
        nutrition: Nutrition {
            calories: s.estimated_calories,
            protein: macros.protein,
            carbs: macros.carbs,
            fat: macros.fat,
        },
        source,
        external_id: s.external_id.clone(),
    }
}

/// Persists a recipe (or reuses one with the same external id) and links a
/// meal snapshot of it to the plan.
pub async fn materialize(
    st: &AppState,
    plan_id: Uuid,
    suggestion: &MealSuggestion,
    slot: MealSlot,
) -> anyhow::Result<(Recipe, Meal)> {
    let existing = match suggestion.external_id.as_deref() {
        Some(ext) => st.store.find_recipe_by_external_id(ext).await?,
        None => None,
    };
    let recipe = match existing {
        Some(r) => {
            debug!(recipe_id = %r.id, "reusing recipe by external id");
            r
        }
        None => {
            let new = derive_recipe(suggestion, slot, &st.config.materialize);
            st.store.create_recipe(new).await?
        }
    };

    let meal = st
        .store
        .create_meal(NewMeal {
            plan_id,
            slot,
            recipe_id: recipe.id,
            name: recipe.name.clone(),
            calories: recipe.nutrition.calories,
            macros: recipe.nutrition.macros(),
            preparation_time: recipe.prep_time + recipe.cook_time,
        })
        .await?;
    Ok((recipe, meal))
}
