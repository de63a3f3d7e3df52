use std::collections::HashSet;

use serde::Serialize;
use time::{Date, Duration};

use crate::models::ProgressLog;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_logs: usize,
    pub average_weight: f64,
    pub average_adherence: i32,
    pub weight_change: f64,
    pub streak_days: u32,
}

/// Rounds halves toward positive infinity, so -2.25 becomes -2.2.
pub fn round_half_up(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f + 0.5).floor() / f
}

/// First day of the inclusive window `[today - window_days, today]`.
pub fn window_start(today: Date, window_days: u32) -> Date {
    today
        .checked_sub(Duration::days(i64::from(window_days)))
        .unwrap_or(Date::MIN)
}

/// Rolling statistics over the logs falling inside the window ending `today`.
///
/// Logs are ordered by date before taking first and last weight, so the
/// order they were written in does not matter. The streak counts back from
/// `today`; a day without a log ends it, including today itself.
pub fn summarize(logs: &[ProgressLog], today: Date, window_days: u32) -> ProgressStats {
    let start = window_start(today, window_days);
    let mut window: Vec<&ProgressLog> = logs
        .iter()
        .filter(|l| l.log_date >= start && l.log_date <= today)
        .collect();
    if window.is_empty() {
        return ProgressStats::default();
    }
    window.sort_by_key(|l| l.log_date);

    let n = window.len() as f64;
    let average_weight = window.iter().map(|l| l.weight).sum::<f64>() / n;
    let average_adherence =
        window.iter().map(|l| f64::from(l.adherence_score)).sum::<f64>() / n;
    let weight_change = window[window.len() - 1].weight - window[0].weight;

    let dates: HashSet<Date> = window.iter().map(|l| l.log_date).collect();
    let mut streak_days = 0;
    let mut day = today;
    for _ in 0..window_days {
        if !dates.contains(&day) {
            break;
        }
        streak_days += 1;
        match day.previous_day() {
            Some(prev) => day = prev,
            None => break,
        }
    }

    ProgressStats {
        total_logs: window.len(),
        average_weight: round_half_up(average_weight, 1),
        average_adherence: round_half_up(average_adherence, 0) as i32,
        weight_change: round_half_up(weight_change, 1),
        streak_days,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;

    const TODAY: Date = date!(2024 - 03 - 10);

    fn log(log_date: Date, weight: f64, adherence_score: i32) -> ProgressLog {
        let now = OffsetDateTime::now_utc();
        ProgressLog {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            log_date,
            weight,
            food_consumed: vec![],
            adherence_score,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_window_is_all_zero() {
        let stats = summarize(&[], TODAY, 30);
        assert_eq!(
            stats,
            ProgressStats {
                total_logs: 0,
                average_weight: 0.0,
                average_adherence: 0,
                weight_change: 0.0,
                streak_days: 0,
            }
        );
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let logs = [
            log(TODAY, 170.0, 80),
            log(date!(2024 - 03 - 09), 171.0, 80),
            log(date!(2024 - 03 - 07), 172.0, 80),
        ];
        assert_eq!(summarize(&logs, TODAY, 30).streak_days, 2);
    }

    #[test]
    fn streak_requires_a_log_today() {
        let logs = [
            log(date!(2024 - 03 - 09), 171.0, 80),
            log(date!(2024 - 03 - 08), 172.0, 80),
        ];
        let stats = summarize(&logs, TODAY, 30);
        assert_eq!(stats.streak_days, 0);
        assert_eq!(stats.total_logs, 2);
    }

    #[test]
    fn streak_is_bounded_by_window() {
        let logs: Vec<ProgressLog> = (0..10)
            .map(|i| log(TODAY - Duration::days(i), 170.0, 90))
            .collect();
        assert_eq!(summarize(&logs, TODAY, 5).streak_days, 5);
        assert_eq!(summarize(&logs, TODAY, 30).streak_days, 10);
    }

    #[test]
    fn weight_change_follows_dates_not_insertion_order() {
        let logs = [log(date!(2024 - 03 - 05), 148.0, 70), log(date!(2024 - 03 - 01), 150.0, 90)];
        let stats = summarize(&logs, TODAY, 30);
        assert_eq!(stats.weight_change, -2.0);
        assert_eq!(stats.average_weight, 149.0);
        assert_eq!(stats.average_adherence, 80);
    }

    #[test]
    fn averages_are_rounded() {
        let logs = [
            log(TODAY, 150.0, 70),
            log(date!(2024 - 03 - 09), 150.1, 71),
            log(date!(2024 - 03 - 08), 150.3, 71),
        ];
        let stats = summarize(&logs, TODAY, 30);
        assert_eq!(stats.average_weight, 150.1);
        assert_eq!(stats.average_adherence, 71);
        assert_eq!(stats.weight_change, -0.3);
    }

    #[test]
    fn logs_outside_window_are_ignored() {
        let logs = [
            log(TODAY, 160.0, 100),
            log(date!(2024 - 01 - 01), 200.0, 0),
            log(date!(2024 - 03 - 11), 100.0, 0),
        ];
        let stats = summarize(&logs, TODAY, 30);
        assert_eq!(stats.total_logs, 1);
        assert_eq!(stats.average_weight, 160.0);
        assert_eq!(stats.weight_change, 0.0);
    }

    #[test]
    fn half_rounds_up() {
        assert_eq!(round_half_up(2.25, 1), 2.3);
        assert_eq!(round_half_up(-2.25, 1), -2.2);
        assert_eq!(round_half_up(70.5, 0), 71.0);
    }
}
