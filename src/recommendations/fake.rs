use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Difficulty, EngineError, EngineResult, MealSuggestion, NutritionTargets, ProgressAnalysis,
    RecommendationEngine,
};
use crate::models::{DietPlan, Macros, MealSlot, ProgressLog, UserProfile};

/// Scripted engine for service tests.
pub struct FakeEngine {
    pub targets: Mutex<EngineResult<NutritionTargets>>,
    /// Yield once inside the targets call so concurrent generations interleave.
    pub yield_in_targets: AtomicBool,
    pub slot_failures: Mutex<HashMap<MealSlot, EngineError>>,
    pub slot_delays: Mutex<HashMap<MealSlot, Duration>>,
    pub suggestions_per_slot: usize,
    pub narration: Mutex<EngineResult<String>>,
    pub analysis: Mutex<EngineResult<ProgressAnalysis>>,
    pub target_calls: AtomicUsize,
    pub meal_calls: AtomicUsize,
    pub analysis_calls: AtomicUsize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            targets: Mutex::new(Ok(NutritionTargets {
                calorie_target: 2000,
                macro_targets: Macros {
                    protein: 120,
                    carbs: 250,
                    fat: 65,
                },
                explanation: "balanced deficit".into(),
                tips: vec!["eat vegetables".into()],
                warnings: vec![],
            })),
            yield_in_targets: AtomicBool::new(false),
            slot_failures: Mutex::new(HashMap::new()),
            slot_delays: Mutex::new(HashMap::new()),
            suggestions_per_slot: 3,
            narration: Mutex::new(Ok("narrated plan".into())),
            analysis: Mutex::new(Ok(ProgressAnalysis {
                insights: vec!["steady".into()],
                recommendations: vec!["keep going".into()],
                motivation: "nice".into(),
            })),
            target_calls: AtomicUsize::new(0),
            meal_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeEngine {
    pub fn failing_targets(err: EngineError) -> Self {
        let engine = Self::default();
        *engine.targets.lock().unwrap() = Err(err);
        engine
    }

    pub fn interleave_targets(&self) {
        self.yield_in_targets.store(true, Ordering::SeqCst);
    }

    pub fn fail_slot(&self, slot: MealSlot, err: EngineError) {
        self.slot_failures.lock().unwrap().insert(slot, err);
    }

    pub fn delay_slot(&self, slot: MealSlot, delay: Duration) {
        self.slot_delays.lock().unwrap().insert(slot, delay);
    }

    pub fn fail_narration(&self, err: EngineError) {
        *self.narration.lock().unwrap() = Err(err);
    }

    pub fn fail_analysis(&self, err: EngineError) {
        *self.analysis.lock().unwrap() = Err(err);
    }
}

pub fn suggestion(name: &str, calories: i32, prep_time: i32) -> MealSuggestion {
    MealSuggestion {
        name: name.into(),
        description: format!("{name} description"),
        estimated_calories: calories,
        prep_time,
        difficulty: Difficulty::Easy,
        ingredients: vec!["oats".into(), "milk".into()],
        benefits: vec!["fiber".into()],
        macros: None,
        external_id: None,
    }
}

#[async_trait]
impl RecommendationEngine for FakeEngine {
    async fn recommend_targets(&self, _profile: &UserProfile) -> EngineResult<NutritionTargets> {
        self.target_calls.fetch_add(1, Ordering::SeqCst);
        if self.yield_in_targets.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.targets.lock().unwrap().clone()
    }

    async fn recommend_meals(
        &self,
        _profile: &UserProfile,
        slot: MealSlot,
        calorie_target: i32,
    ) -> EngineResult<Vec<MealSuggestion>> {
        self.meal_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.slot_delays.lock().unwrap().get(&slot).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.slot_failures.lock().unwrap().get(&slot) {
            return Err(err.clone());
        }
        let budget = slot.calorie_budget(calorie_target);
        Ok((0..self.suggestions_per_slot)
            .map(|i| suggestion(&format!("{slot} option {i}"), budget, 15))
            .collect())
    }

    async fn narrate_plan(&self, _profile: &UserProfile, _plan: &DietPlan) -> EngineResult<String> {
        self.narration.lock().unwrap().clone()
    }

    async fn analyze_progress(
        &self,
        _profile: &UserProfile,
        _logs: &[ProgressLog],
    ) -> EngineResult<ProgressAnalysis> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.analysis.lock().unwrap().clone()
    }
}
