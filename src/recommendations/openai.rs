use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{
    parse_payload, EngineError, EngineResult, MealSuggestion, MealSuggestions, NutritionTargets,
    ProgressAnalysis, RecommendationEngine,
};
use crate::config::RecommendationConfig;
use crate::models::{DietPlan, MealSlot, ProgressLog, UserProfile};

/// Most recent days handed to progress analysis.
const ANALYSIS_WINDOW: usize = 7;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiEngine {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiEngine {
    pub fn new(cfg: &RecommendationConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    async fn chat(
        &self,
        system: &str,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> EngineResult<String> {
        let api_key = self.api_key.as_deref().ok_or(EngineError::NotConfigured)?;
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            max_tokens,
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Upstream(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(%status, body = %text, "chat completion rejected");
            return Err(EngineError::Upstream(format!("status {status}")));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| EngineError::Schema(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| EngineError::Schema("empty completion".into()))?;
        debug!(len = content.len(), "chat completion received");
        Ok(content)
    }
}

fn list_or(items: impl IntoIterator<Item = impl AsRef<str>>, fallback: &str) -> String {
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

fn profile_block(p: &UserProfile) -> String {
    format!(
        "- Age: {} years\n- Weight: {} lbs\n- Height: {} inches\n- Activity level: {}\n\
         - Dietary preferences: {}\n- Health goals: {}",
        p.age,
        p.weight,
        p.height,
        p.activity_level.as_str(),
        list_or(&p.dietary_preferences, "none specified"),
        list_or(&p.health_goals, "general health"),
    )
}

#[async_trait]
impl RecommendationEngine for OpenAiEngine {
    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn recommend_targets(&self, profile: &UserProfile) -> EngineResult<NutritionTargets> {
        let prompt = format!(
            "Create a daily nutrition plan for this user:\n{}\n\n\
             Respond with JSON only:\n\
             {{\"calorieTarget\": number, \"macroTargets\": {{\"protein\": number, \"carbs\": number, \"fat\": number}}, \
             \"explanation\": string, \"tips\": [string], \"warnings\": [string]}}\n\
             Macro targets are grams per day, all values integers.",
            profile_block(profile)
        );
        let content = self
            .chat(
                "You are a certified dietitian producing safe, evidence-based nutrition targets.",
                prompt,
                0.3,
                1000,
            )
            .await?;
        parse_payload(&content)
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn recommend_meals(
        &self,
        profile: &UserProfile,
        slot: MealSlot,
        calorie_target: i32,
    ) -> EngineResult<Vec<MealSuggestion>> {
        let budget = slot.calorie_budget(calorie_target);
        let prompt = format!(
            "Suggest 3 {slot} options for this user:\n{}\n\n\
             Target calories for this {slot}: about {budget}.\n\
             Respond with JSON only:\n\
             {{\"suggestions\": [{{\"name\": string, \"description\": string, \"estimatedCalories\": integer, \
             \"prepTime\": integer minutes, \"difficulty\": \"easy\"|\"medium\"|\"hard\", \
             \"ingredients\": [string], \"benefits\": [string]}}]}}",
            profile_block(profile)
        );
        let content = self
            .chat(
                "You are a nutritionist planning practical, balanced meals.",
                prompt,
                0.4,
                1200,
            )
            .await?;
        let parsed: MealSuggestions = parse_payload(&content)?;
        Ok(parsed.suggestions)
    }

    #[instrument(skip(self, profile, plan), fields(user_id = %profile.id, plan_id = %plan.id))]
    async fn narrate_plan(&self, profile: &UserProfile, plan: &DietPlan) -> EngineResult<String> {
        let prompt = format!(
            "Explain this nutrition plan to the user in under 200 encouraging words.\n{}\n\n\
             Daily calories: {}\nProtein: {}g\nCarbs: {}g\nFat: {}g",
            profile_block(profile),
            plan.calorie_target,
            plan.macro_targets.protein,
            plan.macro_targets.carbs,
            plan.macro_targets.fat,
        );
        let content = self
            .chat(
                "You are a supportive nutritionist explaining plans in plain terms.",
                prompt,
                0.5,
                300,
            )
            .await?;
        Ok(content.trim().to_string())
    }

    #[instrument(skip(self, profile, logs), fields(user_id = %profile.id, logs = logs.len()))]
    async fn analyze_progress(
        &self,
        profile: &UserProfile,
        logs: &[ProgressLog],
    ) -> EngineResult<ProgressAnalysis> {
        let recent = &logs[logs.len().saturating_sub(ANALYSIS_WINDOW)..];
        let lines = recent
            .iter()
            .map(|l| {
                format!(
                    "- {}: weight {} lbs, adherence {}%",
                    l.log_date, l.weight, l.adherence_score
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "User goals: {}\nRecent progress:\n{lines}\n\n\
             Respond with JSON only:\n\
             {{\"insights\": [string], \"recommendations\": [string], \"motivation\": string}}",
            list_or(&profile.health_goals, "general health"),
        );
        let content = self
            .chat(
                "You are a nutrition coach giving actionable feedback on progress data.",
                prompt,
                0.4,
                500,
            )
            .await?;
        parse_payload(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> RecommendationConfig {
        RecommendationConfig {
            api_key: api_key.map(str::to_string),
            base_url: "http://127.0.0.1:9/v1/".into(),
            model: "test-model".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let engine = OpenAiEngine::new(&config(Some("k"))).unwrap();
        assert_eq!(engine.base_url, "http://127.0.0.1:9/v1");
    }

    #[test]
    fn list_or_uses_fallback_for_empty_sets() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(list_or(&empty, "none"), "none");
        assert_eq!(list_or(&["a".to_string(), "b".to_string()], "none"), "a, b");
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_without_a_request() {
        let engine = OpenAiEngine::new(&config(None)).unwrap();
        let err = engine
            .chat("system", "prompt".into(), 0.1, 10)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NotConfigured);
    }
}
