use async_graphql::InputObject;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::records::{insert_record, patch_record};
use crate::commands::utils::{non_negative, parse_timestamp, required_text, to_fields, PatchBuilder};
use crate::db::PaymentRecord;
use crate::error::DairyResult;
use crate::store::DocumentStore;

pub const PAYMENT_DATE: &str = "payment_date";

/// Payment methods the reports break earnings down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Mpesa,
    Cash,
    Other,
}

impl PaymentMethod {
    /// Case and punctuation are ignored, so "M-Pesa", "MPESA" and "mpesa" agree.
    pub fn classify(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "mpesa" => PaymentMethod::Mpesa,
            "cash" => PaymentMethod::Cash,
            _ => PaymentMethod::Other,
        }
    }
}

#[derive(Debug, Clone, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct PaymentInput {
    pub name: String,
    pub amount: f64,
    pub payment_method: String,
    pub quantity: f64,
    pub payment_date: String,
}

#[derive(Debug, Clone, Default, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct PaymentPatch {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub payment_method: Option<String>,
    pub quantity: Option<f64>,
    pub payment_date: Option<String>,
}

#[derive(Serialize)]
struct PaymentDoc {
    name: String,
    amount: f64,
    payment_method: String,
    quantity: f64,
    payment_date: DateTime<Utc>,
}

pub async fn create_payment_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    input: PaymentInput,
) -> DairyResult<PaymentRecord> {
    let doc = PaymentDoc {
        name: required_text("name", &input.name)?,
        amount: non_negative("amount", input.amount)?,
        payment_method: required_text("payment_method", &input.payment_method)?,
        quantity: non_negative("quantity", input.quantity)?,
        payment_date: parse_timestamp(&input.payment_date, offset)?,
    };
    let record: PaymentRecord = insert_record(store, to_fields(&doc)?).await?;
    tracing::info!(id = record.id, amount = record.amount, method = %record.payment_method, "payment recorded");
    Ok(record)
}

pub async fn update_payment_record(
    store: &dyn DocumentStore,
    offset: FixedOffset,
    id: i64,
    patch: PaymentPatch,
) -> DairyResult<PaymentRecord> {
    let mut fields = PatchBuilder::new();
    fields
        .text("name", patch.name)
        .text("payment_method", patch.payment_method);
    fields.amount("amount", patch.amount)?;
    fields.amount("quantity", patch.quantity)?;
    fields.timestamp(PAYMENT_DATE, patch.payment_date, offset)?;
    patch_record(store, id, fields.finish()?).await
}
