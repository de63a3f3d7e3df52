use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services::{ProgressOverview, DEFAULT_WINDOW_DAYS};
use super::stats::ProgressStats;
use crate::models::ProgressLog;
use crate::recommendations::ProgressAnalysis;
use crate::store::ProgressLogPatch;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogProgressRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub date: Option<Date>,
    pub weight: Option<f64>,
    pub food_consumed: Option<Vec<String>>,
    pub adherence_score: Option<i32>,
    pub notes: Option<String>,
}

impl LogProgressRequest {
    pub fn into_parts(self) -> (Uuid, Option<Date>, ProgressLogPatch) {
        let patch = ProgressLogPatch {
            weight: self.weight,
            food_consumed: self.food_consumed,
            adherence_score: self.adherence_score,
            notes: self.notes,
        };
        (self.user_id, self.date, patch)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub log_id: Uuid,
    pub weight: Option<f64>,
    pub food_consumed: Option<Vec<String>>,
    pub adherence_score: Option<i32>,
    pub notes: Option<String>,
}

impl UpdateProgressRequest {
    pub fn into_parts(self) -> (Uuid, ProgressLogPatch) {
        let patch = ProgressLogPatch {
            weight: self.weight,
            food_consumed: self.food_consumed,
            adherence_score: self.adherence_score,
            notes: self.notes,
        };
        (self.log_id, patch)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub user_id: Uuid,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLogView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub weight: f64,
    pub food_consumed: Vec<String>,
    pub adherence_score: i32,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ProgressLog> for ProgressLogView {
    fn from(l: ProgressLog) -> Self {
        Self {
            id: l.id,
            user_id: l.user_id,
            date: l.log_date,
            weight: l.weight,
            food_consumed: l.food_consumed,
            adherence_score: l.adherence_score,
            notes: l.notes,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedProgressResponse {
    pub progress_log: ProgressLogView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub progress_logs: Vec<ProgressLogView>,
    pub stats: ProgressStats,
    pub insights: Option<ProgressAnalysis>,
}

impl From<ProgressOverview> for ProgressResponse {
    fn from(o: ProgressOverview) -> Self {
        Self {
            progress_logs: o.logs.into_iter().map(ProgressLogView::from).collect(),
            stats: o.stats,
            insights: o.insights,
        }
    }
}
