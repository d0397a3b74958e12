use chrono::{DateTime, Duration, Utc};

use crate::commands::expense::{ExpenseCategory, DATE_OF_ACTION};
use crate::commands::payment::{PaymentMethod, PAYMENT_DATE};
use crate::commands::production::PRODUCTION_DATE;
use crate::commands::records::records_between;
use crate::db::{
    ExpenseCategoryStats, ExpenseRecord, ExpenseSummary, PaymentMethodStats, PaymentRecord,
    PaymentSummary, ProductionRecord, ProductionSummary, ReportSummary,
};
use crate::error::{DairyError, DairyResult};
use crate::store::DocumentStore;

/// A reporting window. `start` is the more recent bound and `end` the older
/// one; records match when their timestamp lies in `[end, start]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DairyResult<Self> {
        if end > start {
            return Err(DairyError::Validation(
                "The window end must not be later than its start.".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to `now`.
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now,
            end: now - Duration::days(days),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WindowRecords {
    pub production: Vec<ProductionRecord>,
    pub payments: Vec<PaymentRecord>,
    pub expenses: Vec<ExpenseRecord>,
}

impl WindowRecords {
    pub fn is_empty(&self) -> bool {
        self.production.is_empty() && self.payments.is_empty() && self.expenses.is_empty()
    }
}

/// Three independent window queries. Any store error aborts the whole fetch.
pub async fn fetch_window(
    store: &dyn DocumentStore,
    window: ReportWindow,
) -> DairyResult<WindowRecords> {
    let production = records_between(store, PRODUCTION_DATE, window.end, window.start).await?;
    let payments = records_between(store, PAYMENT_DATE, window.end, window.start).await?;
    let expenses = records_between(store, DATE_OF_ACTION, window.end, window.start).await?;

    Ok(WindowRecords {
        production,
        payments,
        expenses,
    })
}

pub fn summarize(records: &WindowRecords, market_price: f64) -> ReportSummary {
    let expenses = summarize_expenses(&records.expenses);
    let production = summarize_production(&records.production);
    let payment = summarize_payments(
        &records.payments,
        production.total_milk_production * market_price,
        expenses.total_expenses,
    );

    ReportSummary {
        production,
        payment,
        expenses,
    }
}

fn summarize_production(records: &[ProductionRecord]) -> ProductionSummary {
    let total: f64 = records.iter().map(ProductionRecord::daily_total).sum();
    let count = records.len() as i64;
    ProductionSummary {
        record_count: count,
        total_milk_production: total,
        average_milk_production: (count > 0).then(|| total / count as f64),
    }
}

fn summarize_payments(
    records: &[PaymentRecord],
    expected_gross_earnings: f64,
    total_expenses: f64,
) -> PaymentSummary {
    let mut stats = PaymentMethodStats::default();
    for record in records {
        match PaymentMethod::classify(&record.payment_method) {
            PaymentMethod::Mpesa => stats.mpesa += 1,
            PaymentMethod::Cash => stats.cash += 1,
            PaymentMethod::Other => stats.other += 1,
        }
    }

    let gross: f64 = records.iter().map(|r| r.amount).sum();
    PaymentSummary {
        record_count: records.len() as i64,
        gross_earnings: gross,
        expected_gross_earnings,
        net_earnings: gross - total_expenses,
        payment_methods_stats: stats,
    }
}

fn summarize_expenses(records: &[ExpenseRecord]) -> ExpenseSummary {
    let mut stats = ExpenseCategoryStats::default();
    for record in records {
        let slot = match ExpenseCategory::classify(&record.category) {
            ExpenseCategory::Rent => &mut stats.rent,
            ExpenseCategory::Utilities => &mut stats.utilities,
            ExpenseCategory::SalariesAndWages => &mut stats.salaries_and_wages,
            ExpenseCategory::RawMaterials => &mut stats.raw_materials,
            ExpenseCategory::DirectLabor => &mut stats.direct_labor,
            ExpenseCategory::ManufacturingOverhead => &mut stats.manufacturing_overhead,
            ExpenseCategory::Packaging => &mut stats.packaging,
            ExpenseCategory::Shipping => &mut stats.shipping,
            ExpenseCategory::Other => &mut stats.other,
        };
        *slot += 1;
    }

    ExpenseSummary {
        record_count: records.len() as i64,
        total_expenses: records.iter().map(|r| r.amount).sum(),
        expense_category_stats: stats,
    }
}
