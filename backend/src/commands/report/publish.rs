use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::aggregate::{fetch_window, summarize, ReportWindow};
use crate::commands::notify::broadcast;
use crate::commands::records::insert_record;
use crate::commands::utils::{local_date, to_fields};
use crate::db::{
    ExpenseSummary, PaymentSummary, ProductionSummary, ReportRecord, ReportSummary,
};
use crate::error::DairyResult;
use crate::state::AppState;

const WEEKLY_WINDOW_DAYS: i64 = 7;
const DAILY_WINDOW_DAYS: i64 = 1;

#[derive(Serialize)]
struct ReportDoc {
    title: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    market_price: f64,
    production: ProductionSummary,
    payment: PaymentSummary,
    expenses: ExpenseSummary,
}

pub fn report_title(window: ReportWindow, offset: FixedOffset) -> String {
    format!(
        "Weekly report - {} to {}",
        local_date(window.end, offset).format("%Y-%m-%d"),
        local_date(window.start, offset).format("%Y-%m-%d")
    )
}

pub fn report_message(report: &ReportRecord, link_base: &str) -> String {
    format!(
        "{} is ready. Milk produced: {:.1}, earnings: {:.2}, expenses: {:.2}, net: {:.2}. View it at {}/reports/{}",
        report.title,
        report.production.total_milk_production,
        report.payment.gross_earnings,
        report.expenses.total_expenses,
        report.payment.net_earnings,
        link_base,
        report.id
    )
}

pub fn missing_records_message(window: ReportWindow, offset: FixedOffset) -> String {
    format!(
        "Report not generated - missing records between {} and {}.",
        local_date(window.end, offset).format("%Y-%m-%d"),
        local_date(window.start, offset).format("%Y-%m-%d")
    )
}

/// Aggregates the window, persists the result and notifies the report
/// recipients. Returns `None` when the window holds no records; a failed
/// fetch aborts without notifying.
pub async fn generate_report(
    state: &AppState,
    window: ReportWindow,
) -> DairyResult<Option<ReportRecord>> {
    let config = &state.config;
    let records = fetch_window(state.store.as_ref(), window).await?;

    if records.is_empty() {
        tracing::info!(start = %window.start, end = %window.end, "no records in report window");
        let message = missing_records_message(window, config.utc_offset);
        broadcast(state.notifier.as_ref(), &config.report_recipients, &message).await;
        return Ok(None);
    }

    let market_price = state.market_price.get();
    let ReportSummary {
        production,
        payment,
        expenses,
    } = summarize(&records, market_price);

    let doc = ReportDoc {
        title: report_title(window, config.utc_offset),
        window_start: window.start,
        window_end: window.end,
        market_price,
        production,
        payment,
        expenses,
    };

    let persisted = match to_fields(&doc) {
        Ok(fields) => insert_record::<ReportRecord>(state.store.as_ref(), fields).await,
        Err(e) => Err(e),
    };

    match persisted {
        Ok(report) => {
            tracing::info!(id = report.id, title = %report.title, "report generated");
            let message = report_message(&report, config.link_base());
            broadcast(state.notifier.as_ref(), &config.report_recipients, &message).await;
            Ok(Some(report))
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to persist report");
            let message = missing_records_message(window, config.utc_offset);
            broadcast(state.notifier.as_ref(), &config.report_recipients, &message).await;
            Err(e)
        }
    }
}

/// Weekly job: the seven days leading up to now.
pub async fn run_weekly_report(state: &AppState) {
    let window = ReportWindow::trailing_days(Utc::now(), WEEKLY_WINDOW_DAYS);
    match generate_report(state, window).await {
        Ok(Some(report)) => tracing::info!(id = report.id, "weekly report published"),
        Ok(None) => tracing::info!("weekly report skipped, no records"),
        Err(e) => tracing::error!(error = %e, "weekly report failed"),
    }
}

pub fn daily_update_message(summary: &ReportSummary, day: &str) -> String {
    let average = summary
        .production
        .average_milk_production
        .map(|avg| format!("{:.1}", avg))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Daily update for {}: {} production record(s), {:.1} produced (average {}). {} payment(s) totalling {:.2}. {} expense(s) totalling {:.2}.",
        day,
        summary.production.record_count,
        summary.production.total_milk_production,
        average,
        summary.payment.record_count,
        summary.payment.gross_earnings,
        summary.expenses.record_count,
        summary.expenses.total_expenses
    )
}

/// Daily job: summarizes the last 24 hours without persisting anything.
pub async fn run_daily_update(state: &AppState) -> DairyResult<String> {
    let config = &state.config;
    let window = ReportWindow::trailing_days(Utc::now(), DAILY_WINDOW_DAYS);
    let records = fetch_window(state.store.as_ref(), window).await?;
    let day = local_date(window.start, config.utc_offset)
        .format("%Y-%m-%d")
        .to_string();

    let message = if records.is_empty() {
        format!("Daily update for {}: no records were captured today.", day)
    } else {
        daily_update_message(&summarize(&records, state.market_price.get()), &day)
    };

    let delivered = broadcast(state.notifier.as_ref(), &config.report_recipients, &message).await;
    tracing::info!(delivered, "daily update sent");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::production::{create_production_record, ProductionInput};
    use crate::commands::records::{get_all_records, get_record};
    use crate::error::DairyError;
    use crate::test_support::{test_app, test_app_with_store, FailingStore, WriteFailingStore};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn window_ending_now() -> ReportWindow {
        ReportWindow::trailing_days(Utc::now() + Duration::minutes(1), 7)
    }

    fn production_input(name: &str) -> ProductionInput {
        ProductionInput {
            name: name.to_string(),
            morning_production: 20.0,
            afternoon_production: 15.0,
            evening_production: 15.0,
            production_date: (Utc::now() - Duration::hours(2)).to_rfc3339(),
        }
    }

    async fn seed_production(state: &AppState, name: &str) {
        create_production_record(
            state.store.as_ref(),
            state.config.utc_offset,
            production_input(name),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_title_uses_older_bound_first() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let window = ReportWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(
            report_title(window, offset),
            "Weekly report - 2024-03-01 to 2024-03-08"
        );
    }

    #[tokio::test]
    async fn test_generate_persists_and_notifies() {
        let app = test_app();
        seed_production(&app.state, "Daisy").await;
        seed_production(&app.state, "Bella").await;
        app.state.market_price.set(80.0).unwrap();

        let report = generate_report(&app.state, window_ending_now())
            .await
            .unwrap()
            .expect("report");
        assert_eq!(report.production.total_milk_production, 100.0);
        assert_eq!(report.production.average_milk_production, Some(50.0));
        assert_eq!(report.market_price, 80.0);
        assert_eq!(report.payment.expected_gross_earnings, 8000.0);

        let stored: ReportRecord = get_record(app.state.store.as_ref(), report.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, report.title);

        let sent = app.notifier.sent();
        assert_eq!(sent.len(), app.state.config.report_recipients.len());
        assert!(sent[0]
            .1
            .ends_with(&format!("https://farm.test/reports/{}", report.id)));
    }

    #[tokio::test]
    async fn test_price_change_does_not_rewrite_old_reports() {
        let app = test_app();
        seed_production(&app.state, "Daisy").await;
        let first = generate_report(&app.state, window_ending_now())
            .await
            .unwrap()
            .unwrap();

        app.state.market_price.set(100.0).unwrap();
        let stored: ReportRecord = get_record(app.state.store.as_ref(), first.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.market_price, crate::config::DEFAULT_MARKET_PRICE);
    }

    #[tokio::test]
    async fn test_empty_window_sends_missing_records_notice() {
        let app = test_app();
        let outcome = generate_report(&app.state, window_ending_now()).await.unwrap();
        assert!(outcome.is_none());
        assert!(get_all_records::<ReportRecord>(app.state.store.as_ref())
            .await
            .unwrap()
            .is_empty());

        let sent = app.notifier.sent();
        assert!(!sent.is_empty());
        assert!(sent[0].1.starts_with("Report not generated - missing records"));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_without_partial_report() {
        let app = test_app_with_store(Arc::new(FailingStore));
        let err = generate_report(&app.state, window_ending_now())
            .await
            .unwrap_err();
        assert!(matches!(err, DairyError::Database(_)));
        assert!(app.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_sends_missing_notice() {
        let store = WriteFailingStore::default();
        create_production_record(
            &store.inner,
            FixedOffset::east_opt(3 * 3600).unwrap(),
            production_input("Daisy"),
        )
        .await
        .unwrap();
        let app = test_app_with_store(Arc::new(store));

        let err = generate_report(&app.state, window_ending_now())
            .await
            .unwrap_err();
        assert!(matches!(err, DairyError::WriteFailed));
        let sent = app.notifier.sent();
        assert!(sent[0].1.starts_with("Report not generated - missing records"));
    }

    #[tokio::test]
    async fn test_daily_update_text() {
        let app = test_app();
        let quiet = run_daily_update(&app.state).await.unwrap();
        assert!(quiet.contains("no records were captured today"));

        seed_production(&app.state, "Daisy").await;
        let busy = run_daily_update(&app.state).await.unwrap();
        assert!(busy.contains("1 production record(s)"));
        assert!(busy.contains("50.0 produced"));
    }
}
