use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};
use tokio::task::JoinHandle;

use crate::commands::report::{run_daily_update, run_weekly_report};
use crate::state::AppState;

/// Next farm-local firing time strictly after `now`. With a weekday the job
/// runs weekly, without one it runs daily.
pub fn next_occurrence(
    now: DateTime<FixedOffset>,
    weekday: Option<Weekday>,
    at: NaiveTime,
) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    let today = now.date_naive();

    let days_ahead = match weekday {
        Some(day) => {
            let diff = day.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64;
            (diff + 7) % 7
        }
        None => 0,
    };

    let candidate_day = today + Duration::days(days_ahead);
    let step = if weekday.is_some() { 7 } else { 1 };

    let mut candidate = local(offset, candidate_day.and_time(at));
    while candidate <= now {
        candidate = candidate + Duration::days(step);
    }
    candidate
}

// A fixed offset has no gaps or folds, so every local time maps to one instant.
fn local(offset: FixedOffset, naive: chrono::NaiveDateTime) -> DateTime<FixedOffset> {
    offset
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&naive))
}

fn until(next: DateTime<FixedOffset>) -> std::time::Duration {
    (next.with_timezone(&Utc) - Utc::now())
        .to_std()
        .unwrap_or_default()
}

/// Starts the weekly report and daily update loops. Each run is logged; a
/// failed run is not retried and the loop waits for the next slot.
pub fn spawn(state: AppState) -> Vec<JoinHandle<()>> {
    if !state.config.scheduler_enabled {
        tracing::info!("scheduler disabled");
        return Vec::new();
    }

    let weekly_state = state.clone();
    let weekly = tokio::spawn(async move {
        let config = weekly_state.config.clone();
        loop {
            let now = Utc::now().with_timezone(&config.utc_offset);
            let next = next_occurrence(now, Some(config.report_weekday), config.report_time);
            tracing::info!(next = %next, "weekly report scheduled");
            tokio::time::sleep(until(next)).await;
            run_weekly_report(&weekly_state).await;
        }
    });

    let daily_state = state;
    let daily = tokio::spawn(async move {
        let config = daily_state.config.clone();
        loop {
            let now = Utc::now().with_timezone(&config.utc_offset);
            let next = next_occurrence(now, None, config.daily_update_time);
            tracing::debug!(next = %next, "daily update scheduled");
            tokio::time::sleep(until(next)).await;
            if let Err(e) = run_daily_update(&daily_state).await {
                tracing::error!(error = %e, "daily update failed");
            }
        }
    });

    vec![weekly, daily]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nairobi(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_runs_later_today_or_tomorrow() {
        // 2024-03-04 is a Monday.
        let early = nairobi(2024, 3, 4, 6, 0);
        assert_eq!(next_occurrence(early, None, eight()), nairobi(2024, 3, 4, 8, 0));

        let late = nairobi(2024, 3, 4, 9, 0);
        assert_eq!(next_occurrence(late, None, eight()), nairobi(2024, 3, 5, 8, 0));

        let exact = nairobi(2024, 3, 4, 8, 0);
        assert_eq!(next_occurrence(exact, None, eight()), nairobi(2024, 3, 5, 8, 0));
    }

    #[test]
    fn test_weekly_picks_the_next_matching_weekday() {
        let monday_early = nairobi(2024, 3, 4, 6, 0);
        assert_eq!(
            next_occurrence(monday_early, Some(Weekday::Mon), eight()),
            nairobi(2024, 3, 4, 8, 0)
        );

        let monday_late = nairobi(2024, 3, 4, 9, 0);
        assert_eq!(
            next_occurrence(monday_late, Some(Weekday::Mon), eight()),
            nairobi(2024, 3, 11, 8, 0)
        );

        let thursday = nairobi(2024, 3, 7, 12, 0);
        assert_eq!(
            next_occurrence(thursday, Some(Weekday::Sun), eight()),
            nairobi(2024, 3, 10, 8, 0)
        );
    }

    #[tokio::test]
    async fn test_disabled_scheduler_spawns_nothing() {
        let app = crate::test_support::test_app();
        assert!(spawn(app.state).is_empty());
    }
}
