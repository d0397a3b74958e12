use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use super::{Collection, Document, DocumentStore, Fields};
use crate::db::DbPool;
use crate::error::{DairyError, DairyResult};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: i64,
    doc: Value,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        let body = match row.doc {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        Document {
            id: row.id,
            body,
            created_on: row.created_on,
            updated_on: row.updated_on,
        }
    }
}

fn map_write_error(err: sqlx::Error) -> DairyError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return DairyError::Duplicate("User already exists.".to_string());
        }
    }
    DairyError::Database(err)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(
        &self,
        collection: Collection,
        body: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<Document> {
        let sql = format!(
            "INSERT INTO {} (doc, created_on, updated_on) VALUES ($1, $2, $2)
             RETURNING id, doc, created_on, updated_on",
            collection.table()
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(Value::Object(body))
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        row.map(Document::from).ok_or(DairyError::WriteFailed)
    }

    async fn find_by_id(&self, collection: Collection, id: i64) -> DairyResult<Option<Document>> {
        let sql = format!(
            "SELECT id, doc, created_on, updated_on FROM {} WHERE id = $1",
            collection.table()
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Document::from))
    }

    async fn find_all(&self, collection: Collection) -> DairyResult<Vec<Document>> {
        let sql = format!(
            "SELECT id, doc, created_on, updated_on FROM {} ORDER BY id ASC",
            collection.table()
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DairyResult<Vec<Document>> {
        let sql = format!(
            "SELECT id, doc, created_on, updated_on FROM {} WHERE doc->>$1 = $2 ORDER BY id ASC",
            collection.table()
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(field)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn find_between(
        &self,
        collection: Collection,
        field: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DairyResult<Vec<Document>> {
        let sql = format!(
            "SELECT id, doc, created_on, updated_on FROM {}
             WHERE (doc->>$1)::timestamptz BETWEEN $2 AND $3
             ORDER BY id ASC",
            collection.table()
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(field)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn merge(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<u64> {
        let sql = format!(
            "UPDATE {} SET doc = doc || $1, updated_on = $2 WHERE id = $3",
            collection.table()
        );
        let result = sqlx::query(&sql)
            .bind(Value::Object(patch))
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, collection: Collection, id: i64) -> DairyResult<u64> {
        let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: Collection) -> DairyResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        let count: (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count.0)
    }

    async fn ping(&self) -> DairyResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// These run against the database named by `DATABASE_URL` and are skipped
/// when it is unset. Rows are tagged with a per-run marker so repeated or
/// parallel runs do not see each other's data.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::delete_record;
    use crate::db::{self, ExpenseRecord};
    use chrono::TimeZone;
    use serde_json::json;

    async fn setup_test_store() -> Option<PgStore> {
        dotenvy::dotenv().ok();
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres store test");
            return None;
        };
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to run migrations");
        Some(PgStore::new(pool))
    }

    fn marker(test: &str) -> String {
        format!("{}-{}", test, Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1999, 3, day, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_pg_find_between_is_inclusive() {
        let Some(store) = setup_test_store().await else {
            return;
        };
        let run = marker("window");
        for day in [1, 5, 8, 9] {
            store
                .insert(
                    Collection::Payments,
                    fields(json!({ "run": run, "payment_date": at(day) })),
                    at(day),
                )
                .await
                .unwrap();
        }

        let hits = store
            .find_between(Collection::Payments, "payment_date", at(1), at(8))
            .await
            .unwrap();
        let mine: Vec<_> = hits
            .iter()
            .filter(|d| d.body["run"] == json!(run))
            .map(|d| d.timestamp("payment_date").unwrap())
            .collect();
        assert_eq!(mine, vec![at(1), at(5), at(8)]);
    }

    #[tokio::test]
    async fn test_pg_merge_stamps_updated_on_and_keeps_other_fields() {
        let Some(store) = setup_test_store().await else {
            return;
        };
        let run = marker("merge");
        let doc = store
            .insert(
                Collection::Customers,
                fields(json!({"run": run, "name": "Kamau", "trip": "A"})),
                at(1),
            )
            .await
            .unwrap();
        assert_eq!(doc.created_on, at(1));
        assert_eq!(doc.updated_on, at(1));

        let matched = store
            .merge(Collection::Customers, doc.id, fields(json!({"trip": "B"})), at(2))
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let stored = store
            .find_by_id(Collection::Customers, doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body["name"], json!("Kamau"));
        assert_eq!(stored.body["trip"], json!("B"));
        assert_eq!(stored.created_on, at(1));
        assert_eq!(stored.updated_on, at(2));

        let by_run = store
            .find_by_field(Collection::Customers, "run", &run)
            .await
            .unwrap();
        assert_eq!(by_run.len(), 1);

        let missing = store
            .merge(Collection::Customers, -1, fields(json!({"trip": "C"})), at(3))
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_pg_delete_reports_removed_count() {
        let Some(store) = setup_test_store().await else {
            return;
        };
        let doc = store
            .insert(
                Collection::Expenses,
                fields(json!({"run": marker("delete"), "item": "Feed"})),
                at(1),
            )
            .await
            .unwrap();
        assert_eq!(store.delete(Collection::Expenses, doc.id).await.unwrap(), 1);
        assert_eq!(store.delete(Collection::Expenses, doc.id).await.unwrap(), 0);

        let err = delete_record::<ExpenseRecord>(&store, doc.id).await.unwrap_err();
        assert!(matches!(err, DairyError::WriteFailed));
    }

    #[tokio::test]
    async fn test_pg_unique_violation_is_duplicate() {
        let Some(store) = setup_test_store().await else {
            return;
        };
        let run = marker("users");
        let email = format!("{}@farm.test", run);
        store
            .insert(
                Collection::Users,
                fields(json!({"username": run, "email": email})),
                at(1),
            )
            .await
            .unwrap();

        let same_email = store
            .insert(
                Collection::Users,
                fields(json!({"username": format!("{}-other", run), "email": email})),
                at(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(same_email, DairyError::Duplicate(_)));

        let same_username = store
            .insert(
                Collection::Users,
                fields(json!({"username": run, "email": format!("other-{}", email)})),
                at(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(same_username, DairyError::Duplicate(_)));
    }
}
