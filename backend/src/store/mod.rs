use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DairyResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Top-level document fields, as stored and as merged by a patch.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Production,
    Payments,
    Customers,
    Expenses,
    Users,
    Reports,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Production,
        Collection::Payments,
        Collection::Customers,
        Collection::Expenses,
        Collection::Users,
        Collection::Reports,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Production => "milk_production",
            Collection::Payments => "milk_payment",
            Collection::Customers => "milk_customers",
            Collection::Expenses => "production_expenses",
            Collection::Users => "app_users",
            Collection::Reports => "auto_gen_reports",
        }
    }
}

/// A stored document with its server-assigned id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: i64,
    pub body: Fields,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Document {
    pub fn decode<R: DeserializeOwned>(self) -> DairyResult<R> {
        let mut body = self.body;
        body.insert("id".to_string(), Value::from(self.id));
        body.insert(
            "created_on".to_string(),
            serde_json::to_value(self.created_on)?,
        );
        body.insert(
            "updated_on".to_string(),
            serde_json::to_value(self.updated_on)?,
        );
        Ok(serde_json::from_value(Value::Object(body))?)
    }

    /// Reads a top-level RFC 3339 timestamp field.
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.body
            .get(field)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Storage for the record collections. One instance is built at startup and
/// shared by every request handler and the scheduler.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document; a store that does not hand back the new row is a
    /// `WriteFailed`.
    async fn insert(
        &self,
        collection: Collection,
        body: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<Document>;

    async fn find_by_id(&self, collection: Collection, id: i64) -> DairyResult<Option<Document>>;

    /// All documents in insertion order.
    async fn find_all(&self, collection: Collection) -> DairyResult<Vec<Document>>;

    /// Documents whose top-level string `field` equals `value`.
    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DairyResult<Vec<Document>>;

    /// Documents whose timestamp `field` lies in `[from, to]`.
    async fn find_between(
        &self,
        collection: Collection,
        field: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DairyResult<Vec<Document>>;

    /// Merges `patch` into the document and stamps `updated_on` in one write.
    /// Returns the number of documents matched.
    async fn merge(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<u64>;

    /// Returns the number of documents removed.
    async fn delete(&self, collection: Collection, id: i64) -> DairyResult<u64>;

    async fn count(&self, collection: Collection) -> DairyResult<i64>;

    async fn ping(&self) -> DairyResult<()>;
}
