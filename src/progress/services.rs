use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::stats::{summarize, window_start, ProgressStats};
use crate::error::AppError;
use crate::models::{ProgressLog, UserProfile};
use crate::recommendations::{bounded, ProgressAnalysis};
use crate::state::AppState;
use crate::store::ProgressLogPatch;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
const MAX_WINDOW_DAYS: u32 = 365;
/// Fewer logs than this and no insights are requested.
pub const INSIGHT_MIN_LOGS: usize = 3;
const INSIGHT_LOG_LIMIT: usize = 7;

#[derive(Debug, Clone)]
pub struct ProgressOverview {
    pub logs: Vec<ProgressLog>,
    pub stats: ProgressStats,
    pub insights: Option<ProgressAnalysis>,
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn validate_patch(patch: &ProgressLogPatch) -> Result<(), AppError> {
    if let Some(w) = patch.weight {
        if !w.is_finite() || !(50.0..=1000.0).contains(&w) {
            return Err(AppError::validation("weight", "must be between 50 and 1000 lbs"));
        }
    }
    if let Some(a) = patch.adherence_score {
        if !(0..=100).contains(&a) {
            return Err(AppError::validation(
                "adherence_score",
                "must be between 0 and 100",
            ));
        }
    }
    Ok(())
}

fn validate_window(window_days: u32) -> Result<(), AppError> {
    if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
        return Err(AppError::validation(
            "days",
            format!("must be between 1 and {MAX_WINDOW_DAYS}"),
        ));
    }
    Ok(())
}

async fn ensure_user(st: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    st.store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}

/// Writes the log for `(user, date)`. An existing log keeps every field the
/// patch leaves out; a new one needs weight and adherence.
#[instrument(skip(st, patch))]
pub async fn upsert_log(
    st: &AppState,
    user_id: Uuid,
    date: Option<Date>,
    patch: ProgressLogPatch,
) -> Result<ProgressLog, AppError> {
    validate_patch(&patch)?;
    ensure_user(st, user_id).await?;
    let log_date = date.unwrap_or_else(today);

    if st.store.get_log_by_date(user_id, log_date).await?.is_none() {
        if patch.weight.is_none() {
            return Err(AppError::validation("weight", "is required for a new log"));
        }
        if patch.adherence_score.is_none() {
            return Err(AppError::validation(
                "adherence_score",
                "is required for a new log",
            ));
        }
    }

    let log = st
        .store
        .upsert_progress_log(user_id, log_date, patch)
        .await?;
    info!(%user_id, %log_date, "progress logged");
    Ok(log)
}

/// Edits one log by id. Omitted fields keep their value; the owner and the
/// date never change.
#[instrument(skip(st, patch))]
pub async fn update_log(
    st: &AppState,
    log_id: Uuid,
    patch: ProgressLogPatch,
) -> Result<ProgressLog, AppError> {
    validate_patch(&patch)?;
    let log = st
        .store
        .update_progress_log(log_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("progress log".into()))?;
    info!(%log_id, user_id = %log.user_id, "progress log updated");
    Ok(log)
}

async fn window_logs(
    st: &AppState,
    user_id: Uuid,
    window_days: u32,
    today: Date,
) -> Result<Vec<ProgressLog>, AppError> {
    let start = window_start(today, window_days);
    Ok(st.store.get_logs_in_range(user_id, start, today).await?)
}

/// Logs inside the window, newest first.
pub async fn list_logs(
    st: &AppState,
    user_id: Uuid,
    window_days: u32,
    today: Date,
) -> Result<Vec<ProgressLog>, AppError> {
    validate_window(window_days)?;
    ensure_user(st, user_id).await?;
    let mut logs = window_logs(st, user_id, window_days, today).await?;
    logs.reverse();
    Ok(logs)
}

pub async fn compute_stats(
    st: &AppState,
    user_id: Uuid,
    window_days: u32,
    today: Date,
) -> Result<ProgressStats, AppError> {
    validate_window(window_days)?;
    ensure_user(st, user_id).await?;
    let logs = window_logs(st, user_id, window_days, today).await?;
    Ok(summarize(&logs, today, window_days))
}

/// Best-effort coaching narrative. `logs` must be in ascending date order;
/// only the most recent ones are sent.
pub async fn generate_insights(
    st: &AppState,
    profile: &UserProfile,
    logs: &[ProgressLog],
) -> Option<ProgressAnalysis> {
    if logs.len() < INSIGHT_MIN_LOGS {
        return None;
    }
    let recent = &logs[logs.len().saturating_sub(INSIGHT_LOG_LIMIT)..];
    let limit = st.config.recommendations.timeout();
    match bounded(limit, st.engine.analyze_progress(profile, recent)).await {
        Ok(analysis) => Some(analysis),
        Err(e) => {
            warn!(user_id = %profile.id, error = %e, "progress insights unavailable");
            None
        }
    }
}

/// Logs, stats and insights for one window, read in a single query.
#[instrument(skip(st))]
pub async fn progress_overview(
    st: &AppState,
    user_id: Uuid,
    window_days: u32,
    today: Date,
) -> Result<ProgressOverview, AppError> {
    validate_window(window_days)?;
    let profile = ensure_user(st, user_id).await?;
    let logs = window_logs(st, user_id, window_days, today).await?;
    let stats = summarize(&logs, today, window_days);
    let insights = generate_insights(st, &profile, &logs).await;

    let mut logs = logs;
    logs.reverse();
    Ok(ProgressOverview {
        logs,
        stats,
        insights,
    })
}
