use async_graphql::InputObject;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::records::{insert_record, patch_record};
use crate::commands::utils::{non_negative, parse_timestamp, required_text, to_fields, PatchBuilder};
use crate::db::ExpenseRecord;
use crate::error::DairyResult;
use crate::store::DocumentStore;

pub const DATE_OF_ACTION: &str = "date_of_action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    SalariesAndWages,
    RawMaterials,
    DirectLabor,
    ManufacturingOverhead,
    Packaging,
    Shipping,
    Other,
}

impl ExpenseCategory {
    pub const KNOWN: [(&'static str, ExpenseCategory); 8] = [
        ("Rent", ExpenseCategory::Rent),
        ("Utilities", ExpenseCategory::Utilities),
        ("Salaries and Wages", ExpenseCategory::SalariesAndWages),
        ("Raw Materials", ExpenseCategory::RawMaterials),
        ("Direct Labor", ExpenseCategory::DirectLabor),
        ("Manufacturing Overhead", ExpenseCategory::ManufacturingOverhead),
        ("Packaging", ExpenseCategory::Packaging),
        ("Shipping", ExpenseCategory::Shipping),
    ];

    /// Matches a stored category against the known names, ignoring case,
    /// spacing and punctuation. Anything else is `Other`.
    pub fn classify(raw: &str) -> Self {
        let key = fold(raw);
        Self::KNOWN
            .iter()
            .find(|(name, _)| fold(name) == key)
            .map(|(_, category)| *category)
            .unwrap_or(ExpenseCategory::Other)
    }
}

fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ExpenseInput {
    pub item: String,
    pub category: String,
    pub amount: f64,
    pub date_of_action: String,
}

#[derive(Debug, Clone, Default, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ExpensePatch {
    pub item: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub date_of_action: Option<String>,
}

#[derive(Serialize)]
struct ExpenseDoc {
    item: String,
    category: String,
    amount: f64,
    date_of_action: DateTime<Utc>,
}

pub async fn create_expense_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    input: ExpenseInput,
) -> DairyResult<ExpenseRecord> {
    let doc = ExpenseDoc {
        item: required_text("item", &input.item)?,
        category: required_text("category", &input.category)?,
        amount: non_negative("amount", input.amount)?,
        date_of_action: parse_timestamp(&input.date_of_action, offset)?,
    };
    if ExpenseCategory::classify(&doc.category) == ExpenseCategory::Other {
        tracing::debug!(category = %doc.category, "expense category outside the known set");
    }
    let record: ExpenseRecord = insert_record(store, to_fields(&doc)?).await?;
    tracing::info!(id = record.id, amount = record.amount, "expense recorded");
    Ok(record)
}

pub async fn update_expense_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    id: i64,
    patch: ExpensePatch,
) -> DairyResult<ExpenseRecord> {
    let mut fields = PatchBuilder::new();
    fields.text("item", patch.item).text("category", patch.category);
    fields.amount("amount", patch.amount)?;
    fields.timestamp(DATE_OF_ACTION, patch.date_of_action, offset)?;
    patch_record(store, id, fields.finish()?).await
}
