//! Recommendation source: nutrition targets, meal suggestions and narration.
//!
//! The engine is non-deterministic and may fail or return malformed content.
//! Every payload is deserialized into a typed struct and checked by
//! [`Validate`] before the services see it, so a bad shape surfaces as
//! [`EngineError::Schema`] instead of a panic further down.

#[cfg(test)]
pub mod fake;
pub mod openai;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{DietPlan, Macros, MealSlot, ProgressLog, UserProfile};

pub use openai::OpenAiEngine;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("recommendation call failed: {0}")]
    Upstream(String),

    #[error("recommendation payload rejected: {0}")]
    Schema(String),

    #[error("recommendation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("recommendation engine is not configured")]
    NotConfigured,
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTargets {
    pub calorie_target: i32,
    pub macro_targets: Macros,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSuggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub estimated_calories: i32,
    pub prep_time: i32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    /// Explicit breakdown when the source provides one.
    #[serde(default)]
    pub macros: Option<Macros>,
    /// Set for suggestions backed by an external recipe catalog.
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealSuggestions {
    pub suggestions: Vec<MealSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAnalysis {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub motivation: String,
}

/// Shape checks beyond what deserialization enforces. List payloads may drop
/// individual bad items as long as something usable remains.
pub trait Validate {
    fn validate(&mut self) -> Result<(), String>;
}

impl Validate for NutritionTargets {
    fn validate(&mut self) -> Result<(), String> {
        if self.calorie_target <= 0 {
            return Err(format!(
                "calorieTarget must be positive, got {}",
                self.calorie_target
            ));
        }
        if !self.macro_targets.is_non_negative() {
            return Err("macroTargets must be non-negative".into());
        }
        Ok(())
    }
}

impl MealSuggestion {
    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("suggestion name is empty".into());
        }
        if self.estimated_calories <= 0 {
            return Err(format!(
                "estimatedCalories must be positive for {:?}",
                self.name
            ));
        }
        if self.prep_time < 0 {
            return Err(format!("prepTime is negative for {:?}", self.name));
        }
        if let Some(m) = &self.macros {
            if !m.is_non_negative() {
                return Err(format!("macros are negative for {:?}", self.name));
            }
        }
        Ok(())
    }
}

impl Validate for MealSuggestions {
    fn validate(&mut self) -> Result<(), String> {
        if self.suggestions.is_empty() {
            return Err("no suggestions returned".into());
        }
        let mut first_err = None;
        self.suggestions.retain(|s| match s.check() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "dropping invalid suggestion");
                first_err.get_or_insert(e);
                false
            }
        });
        match first_err {
            Some(e) if self.suggestions.is_empty() => Err(e),
            _ => Ok(()),
        }
    }
}

impl Validate for ProgressAnalysis {
    fn validate(&mut self) -> Result<(), String> {
        if self.insights.is_empty() && self.recommendations.is_empty() {
            return Err("analysis has neither insights nor recommendations".into());
        }
        Ok(())
    }
}

/// Parses model output into `T`, tolerating a surrounding markdown code fence.
pub fn parse_payload<T>(content: &str) -> EngineResult<T>
where
    T: DeserializeOwned + Validate,
{
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let mut value: T =
        serde_json::from_str(body).map_err(|e| EngineError::Schema(e.to_string()))?;
    value.validate().map_err(EngineError::Schema)?;
    Ok(value)
}

/// Runs an engine call under a deadline.
pub async fn bounded<T, F>(limit: Duration, call: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(res) => res,
        Err(_) => Err(EngineError::Timeout(limit)),
    }
}

#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn recommend_targets(&self, profile: &UserProfile) -> EngineResult<NutritionTargets>;

    /// Suggestions for one slot. `calorie_target` is the daily total; the
    /// engine sizes the slot with [`MealSlot::calorie_budget`].
    async fn recommend_meals(
        &self,
        profile: &UserProfile,
        slot: MealSlot,
        calorie_target: i32,
    ) -> EngineResult<Vec<MealSuggestion>>;

    async fn narrate_plan(&self, profile: &UserProfile, plan: &DietPlan) -> EngineResult<String>;

    async fn analyze_progress(
        &self,
        profile: &UserProfile,
        logs: &[ProgressLog],
    ) -> EngineResult<ProgressAnalysis>;
}
