//! Collection-agnostic record operations shared by every entity kind.

use chrono::{DateTime, Utc};

use crate::db::Record;
use crate::error::{DairyError, DairyResult};
use crate::store::{DocumentStore, Fields};

pub async fn insert_record<R: Record>(store: &dyn DocumentStore, body: Fields) -> DairyResult<R> {
    let doc = store.insert(R::COLLECTION, body, Utc::now()).await?;
    doc.decode()
}

pub async fn get_record<R: Record>(store: &dyn DocumentStore, id: i64) -> DairyResult<Option<R>> {
    match store.find_by_id(R::COLLECTION, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

pub async fn require_record<R: Record>(store: &dyn DocumentStore, id: i64) -> DairyResult<R> {
    get_record(store, id)
        .await?
        .ok_or_else(|| DairyError::NotFound(format!("{} {} not found.", R::LABEL, id)))
}

pub async fn get_all_records<R: Record>(store: &dyn DocumentStore) -> DairyResult<Vec<R>> {
    store
        .find_all(R::COLLECTION)
        .await?
        .into_iter()
        .map(|doc| doc.decode())
        .collect()
}

pub async fn find_records<R: Record>(
    store: &dyn DocumentStore,
    field: &str,
    value: &str,
) -> DairyResult<Vec<R>> {
    store
        .find_by_field(R::COLLECTION, field, value)
        .await?
        .into_iter()
        .map(|doc| doc.decode())
        .collect()
}

pub async fn records_between<R: Record>(
    store: &dyn DocumentStore,
    field: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DairyResult<Vec<R>> {
    store
        .find_between(R::COLLECTION, field, from, to)
        .await?
        .into_iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Applies a partial update in a single write. An empty patch is rejected
/// before the store is touched, so `updated_on` stays as it was.
pub async fn patch_record<R: Record>(
    store: &dyn DocumentStore,
    id: i64,
    patch: Fields,
) -> DairyResult<R> {
    if patch.is_empty() {
        return Err(DairyError::EmptyUpdate);
    }
    let matched = store.merge(R::COLLECTION, id, patch, Utc::now()).await?;
    if matched == 0 {
        return Err(DairyError::NotFound(format!("{} {} not found.", R::LABEL, id)));
    }
    require_record(store, id).await
}

/// Anything other than exactly one removed document is a failed write.
pub async fn delete_record<R: Record>(store: &dyn DocumentStore, id: i64) -> DairyResult<()> {
    let removed = store.delete(R::COLLECTION, id).await?;
    if removed != 1 {
        tracing::warn!(collection = R::COLLECTION.table(), id, removed, "delete did not remove exactly one record");
        return Err(DairyError::WriteFailed);
    }
    Ok(())
}
