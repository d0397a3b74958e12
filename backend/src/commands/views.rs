//! Read-only REST views over the production records.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::commands::production::{get_production_records_by_name, get_production_records_on};
use crate::commands::records::get_all_records;
use crate::commands::utils::parse_date_safe;
use crate::db::ProductionRecord;
use crate::error::{DairyError, DairyResult};
use crate::state::AppState;
use crate::store::Collection;

const PRODUCTION_TABLE: &str = "milk_production";
const NONE_FOUND: &str = "0 records found.";

fn records_body(records: Vec<ProductionRecord>, found: String) -> DairyResult<Json<Value>> {
    if records.is_empty() {
        return Ok(Json(json!({ "data": { "message": NONE_FOUND } })));
    }
    Ok(Json(json!({
        "data": {
            "message": found,
            "records": serde_json::to_value(records)?,
        }
    })))
}

pub async fn check_connection(State(state): State<AppState>) -> DairyResult<Json<Value>> {
    state.store.ping().await?;
    Ok(Json(json!({ "data": { "message": "Connection successful." } })))
}

pub async fn view_tables(State(state): State<AppState>) -> DairyResult<Json<Value>> {
    let mut tables = Vec::new();
    for collection in Collection::ALL {
        tables.push(json!({
            "table": collection.table(),
            "records": state.store.count(collection).await?,
        }));
    }
    Ok(Json(json!({
        "data": {
            "message": format!("{} table(s) found.", tables.len()),
            "records": tables,
        }
    })))
}

pub async fn view_all_records(State(state): State<AppState>) -> DairyResult<Json<Value>> {
    let records: Vec<ProductionRecord> = get_all_records(state.store.as_ref()).await?;
    let found = format!(
        "{} record(s) found in table '{}'.",
        records.len(),
        PRODUCTION_TABLE
    );
    records_body(records, found)
}

pub async fn view_record(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> DairyResult<Json<Value>> {
    let records = get_production_records_by_name(state.store.as_ref(), &name).await?;
    let found = format!(
        "{} record(s) of '{}' found in table '{}'.",
        records.len(),
        name,
        PRODUCTION_TABLE
    );
    records_body(records, found)
}

pub async fn view_record_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> DairyResult<Json<Value>> {
    let day = parse_date_safe(&date).ok_or_else(|| {
        DairyError::Validation(format!("Invalid date '{}'. Expected YYYY-MM-DD.", date))
    })?;
    let records =
        get_production_records_on(state.store.as_ref(), day, state.config.utc_offset).await?;
    let found = format!(
        "{} record(s) from date '{}' found in table '{}'.",
        records.len(),
        date,
        PRODUCTION_TABLE
    );
    records_body(records, found)
}
