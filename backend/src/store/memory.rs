use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{Collection, Document, DocumentStore, Fields};
use crate::error::{DairyError, DairyResult};

/// In-process store with the same semantics as [`super::PgStore`].
/// Used with `STORE_BACKEND=memory` and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    collections: HashMap<Collection, BTreeMap<i64, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> DairyResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| DairyError::Internal("memory store lock poisoned".to_string()))
    }
}

fn scan<F>(tables: &Tables, collection: Collection, keep: F) -> Vec<Document>
where
    F: Fn(&Document) -> bool,
{
    tables
        .collections
        .get(&collection)
        .map(|docs| docs.values().filter(|doc| keep(doc)).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        body: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<Document> {
        let mut tables = self.tables()?;

        // Mirror the unique indexes on app_users.
        if collection == Collection::Users {
            let clash = ["email", "username"].iter().any(|key| {
                body.get(*key).is_some()
                    && !scan(&tables, collection, |doc| doc.body.get(*key) == body.get(*key))
                        .is_empty()
            });
            if clash {
                return Err(DairyError::Duplicate("User already exists.".to_string()));
            }
        }

        tables.next_id += 1;
        let doc = Document {
            id: tables.next_id,
            body,
            created_on: now,
            updated_on: now,
        };
        tables
            .collections
            .entry(collection)
            .or_default()
            .insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn find_by_id(&self, collection: Collection, id: i64) -> DairyResult<Option<Document>> {
        let tables = self.tables()?;
        Ok(tables
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .cloned())
    }

    async fn find_all(&self, collection: Collection) -> DairyResult<Vec<Document>> {
        let tables = self.tables()?;
        Ok(scan(&tables, collection, |_| true))
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DairyResult<Vec<Document>> {
        let tables = self.tables()?;
        Ok(scan(&tables, collection, |doc| {
            doc.body.get(field).and_then(Value::as_str) == Some(value)
        }))
    }

    async fn find_between(
        &self,
        collection: Collection,
        field: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DairyResult<Vec<Document>> {
        let tables = self.tables()?;
        Ok(scan(&tables, collection, |doc| {
            doc.timestamp(field)
                .map(|ts| ts >= from && ts <= to)
                .unwrap_or(false)
        }))
    }

    async fn merge(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<u64> {
        let mut tables = self.tables()?;
        let doc = match tables
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(&id))
        {
            Some(doc) => doc,
            None => return Ok(0),
        };
        for (key, value) in patch {
            doc.body.insert(key, value);
        }
        doc.updated_on = now;
        Ok(1)
    }

    async fn delete(&self, collection: Collection, id: i64) -> DairyResult<u64> {
        let mut tables = self.tables()?;
        let removed = tables
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id));
        Ok(if removed.is_some() { 1 } else { 0 })
    }

    async fn count(&self, collection: Collection) -> DairyResult<i64> {
        let tables = self.tables()?;
        Ok(tables
            .collections
            .get(&collection)
            .map(|docs| docs.len() as i64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> DairyResult<()> {
        self.tables().map(|_| ())
    }
}
