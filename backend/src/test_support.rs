//! Shared fixtures for the in-crate test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::commands::notify::Notifier;
use crate::commands::user::{create_user, set_user_permission, NewUserInput};
use crate::config::{AppConfig, StoreBackend};
use crate::db::{Permission, User};
use crate::error::{DairyError, DairyResult};
use crate::middleware::auth::issue_token;
use crate::state::AppState;
use crate::store::{Collection, Document, DocumentStore, Fields, MemoryStore};

/// Captures every message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipient: &str) -> Self {
        Self {
            sent: Mutex::default(),
            fail_for: Some(recipient.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()> {
        if self.fail_for.as_deref() == Some(recipient) {
            return Err(DairyError::Internal("recipient unreachable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "recording"
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        store_backend: StoreBackend::Memory,
        jwt_secret: b"test-secret".to_vec(),
        bcrypt_cost: 4,
        web_app: Some("https://farm.test".to_string()),
        report_recipients: vec!["+254700000001".to_string(), "+254700000002".to_string()],
        scheduler_enabled: false,
        admin_password: "admin-secret".to_string(),
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub mailer: Arc<RecordingNotifier>,
    pub bot: Arc<RecordingNotifier>,
}

pub fn test_app() -> TestApp {
    test_app_with_store(Arc::new(MemoryStore::new()))
}

pub fn test_app_with_store(store: Arc<dyn DocumentStore>) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::new());
    let mailer = Arc::new(RecordingNotifier::new());
    let bot = Arc::new(RecordingNotifier::new());
    let state = AppState::new(
        test_config(),
        store,
        notifier.clone(),
        mailer.clone(),
        bot.clone(),
    );
    TestApp {
        state,
        notifier,
        mailer,
        bot,
    }
}

/// Creates an account with the given permission and returns it with a
/// bearer token.
pub async fn user_with_token(state: &AppState, username: &str, permission: Permission) -> (User, String) {
    let store = state.store.as_ref();
    let user = create_user(
        store,
        &state.config,
        NewUserInput {
            username: username.to_string(),
            email: format!("{}@farm.test", username),
            password: "password".to_string(),
        },
    )
    .await
    .unwrap();
    let user = set_user_permission(store, user.id, permission).await.unwrap();
    let token = issue_token(&state.config, &user).unwrap();
    (user, token)
}

fn unavailable() -> DairyError {
    DairyError::Database(sqlx::Error::PoolClosed)
}

/// A store whose every call fails, like an unreachable database.
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn insert(&self, _: Collection, _: Fields, _: DateTime<Utc>) -> DairyResult<Document> {
        Err(unavailable())
    }

    async fn find_by_id(&self, _: Collection, _: i64) -> DairyResult<Option<Document>> {
        Err(unavailable())
    }

    async fn find_all(&self, _: Collection) -> DairyResult<Vec<Document>> {
        Err(unavailable())
    }

    async fn find_by_field(&self, _: Collection, _: &str, _: &str) -> DairyResult<Vec<Document>> {
        Err(unavailable())
    }

    async fn find_between(
        &self,
        _: Collection,
        _: &str,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> DairyResult<Vec<Document>> {
        Err(unavailable())
    }

    async fn merge(&self, _: Collection, _: i64, _: Fields, _: DateTime<Utc>) -> DairyResult<u64> {
        Err(unavailable())
    }

    async fn delete(&self, _: Collection, _: i64) -> DairyResult<u64> {
        Err(unavailable())
    }

    async fn count(&self, _: Collection) -> DairyResult<i64> {
        Err(unavailable())
    }

    async fn ping(&self) -> DairyResult<()> {
        Err(unavailable())
    }
}

/// Reads succeed against `inner`; inserts are never acknowledged.
#[derive(Default)]
pub struct WriteFailingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for WriteFailingStore {
    async fn insert(&self, _: Collection, _: Fields, _: DateTime<Utc>) -> DairyResult<Document> {
        Err(DairyError::WriteFailed)
    }

    async fn find_by_id(&self, collection: Collection, id: i64) -> DairyResult<Option<Document>> {
        self.inner.find_by_id(collection, id).await
    }

    async fn find_all(&self, collection: Collection) -> DairyResult<Vec<Document>> {
        self.inner.find_all(collection).await
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DairyResult<Vec<Document>> {
        self.inner.find_by_field(collection, field, value).await
    }

    async fn find_between(
        &self,
        collection: Collection,
        field: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DairyResult<Vec<Document>> {
        self.inner.find_between(collection, field, from, to).await
    }

    async fn merge(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> DairyResult<u64> {
        self.inner.merge(collection, id, patch, now).await
    }

    async fn delete(&self, collection: Collection, id: i64) -> DairyResult<u64> {
        self.inner.delete(collection, id).await
    }

    async fn count(&self, collection: Collection) -> DairyResult<i64> {
        self.inner.count(collection).await
    }

    async fn ping(&self) -> DairyResult<()> {
        self.inner.ping().await
    }
}
