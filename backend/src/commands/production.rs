use async_graphql::InputObject;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::records::{find_records, insert_record, patch_record, records_between};
use crate::commands::utils::{
    local_day_bounds, non_negative, parse_timestamp, required_text, to_fields, PatchBuilder,
};
use crate::db::ProductionRecord;
use crate::error::DairyResult;
use crate::store::DocumentStore;

pub const PRODUCTION_DATE: &str = "production_date";

#[derive(Debug, Clone, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ProductionInput {
    pub name: String,
    pub morning_production: f64,
    pub afternoon_production: f64,
    pub evening_production: f64,
    pub production_date: String,
}

#[derive(Debug, Clone, Default, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ProductionPatch {
    pub name: Option<String>,
    pub morning_production: Option<f64>,
    pub afternoon_production: Option<f64>,
    pub evening_production: Option<f64>,
    pub production_date: Option<String>,
}

#[derive(Serialize)]
struct ProductionDoc {
    name: String,
    morning_production: f64,
    afternoon_production: f64,
    evening_production: f64,
    production_date: DateTime<Utc>,
}

pub async fn create_production_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    input: ProductionInput,
) -> DairyResult<ProductionRecord> {
    let doc = ProductionDoc {
        name: required_text("name", &input.name)?,
        morning_production: non_negative("morning_production", input.morning_production)?,
        afternoon_production: non_negative("afternoon_production", input.afternoon_production)?,
        evening_production: non_negative("evening_production", input.evening_production)?,
        production_date: parse_timestamp(&input.production_date, offset)?,
    };
    let record: ProductionRecord = insert_record(store, to_fields(&doc)?).await?;
    tracing::info!(id = record.id, name = %record.name, "production record created");
    Ok(record)
}

pub async fn update_production_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    id: i64,
    patch: ProductionPatch,
) -> DairyResult<ProductionRecord> {
    let mut fields = PatchBuilder::new();
    fields.text("name", patch.name);
    fields.amount("morning_production", patch.morning_production)?;
    fields.amount("afternoon_production", patch.afternoon_production)?;
    fields.amount("evening_production", patch.evening_production)?;
    fields.timestamp(PRODUCTION_DATE, patch.production_date, offset)?;
    patch_record(store, id, fields.finish()?).await
}

pub async fn get_production_records_by_name(
    store: &dyn DocumentStore,
    name: &str,
) -> DairyResult<Vec<ProductionRecord>> {
    find_records(store, "name", name.trim()).await
}

pub async fn get_production_records_on(
    store: &dyn DocumentStore,
    date: NaiveDate,
    offset: FixedOffset,
) -> DairyResult<Vec<ProductionRecord>> {
    let (from, to) = local_day_bounds(date, offset)?;
    records_between(store, PRODUCTION_DATE, from, to).await
}
