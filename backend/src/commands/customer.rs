use async_graphql::InputObject;
use serde::{Deserialize, Serialize};

use crate::commands::records::{insert_record, patch_record};
use crate::commands::utils::{non_negative, required_text, to_fields, PatchBuilder};
use crate::db::CustomerRecord;
use crate::error::DairyResult;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Serialize, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct CustomerInput {
    pub name: String,
    pub priority: String,
    pub phone: String,
    pub trip: String,
    pub package: f64,
}

#[derive(Debug, Clone, Default, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub priority: Option<String>,
    pub phone: Option<String>,
    pub trip: Option<String>,
    pub package: Option<f64>,
}

pub async fn create_customer_record(
    store: &dyn DocumentStore,
    input: CustomerInput,
) -> DairyResult<CustomerRecord> {
    let doc = CustomerInput {
        name: required_text("name", &input.name)?,
        priority: input.priority.trim().to_string(),
        phone: input.phone.trim().to_string(),
        trip: input.trip.trim().to_string(),
        package: non_negative("package", input.package)?,
    };
    let record: CustomerRecord = insert_record(store, to_fields(&doc)?).await?;
    tracing::info!(id = record.id, name = %record.name, "customer added");
    Ok(record)
}

pub async fn update_customer_record(
    store: &dyn DocumentStore,
    id: i64,
    patch: CustomerPatch,
) -> DairyResult<CustomerRecord> {
    let mut fields = PatchBuilder::new();
    fields
        .text("name", patch.name)
        .text("priority", patch.priority)
        .text("phone", patch.phone)
        .text("trip", patch.trip);
    fields.amount("package", patch.package)?;
    patch_record(store, id, fields.finish()?).await
}
