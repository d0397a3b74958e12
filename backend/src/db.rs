use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;

use crate::error::{DairyError, DairyResult};
use crate::store::Collection;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> DairyResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| DairyError::Internal(format!("Invalid DB URL: {}", e)))?;

    // Lazy: the first query establishes the connection.
    Ok(PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .connect_lazy_with(opts))
}

pub async fn init_database(pool: &DbPool) -> DairyResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// A typed view over one collection's documents.
pub trait Record: DeserializeOwned + Send {
    const COLLECTION: Collection;
    const LABEL: &'static str;
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ProductionRecord {
    pub id: i64,
    pub name: String,
    pub morning_production: f64,
    pub afternoon_production: f64,
    pub evening_production: f64,
    pub production_date: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl ProductionRecord {
    pub fn daily_total(&self) -> f64 {
        self.morning_production + self.afternoon_production + self.evening_production
    }
}

impl Record for ProductionRecord {
    const COLLECTION: Collection = Collection::Production;
    const LABEL: &'static str = "Production record";
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct PaymentRecord {
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub payment_method: String,
    pub quantity: f64,
    pub payment_date: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Record for PaymentRecord {
    const COLLECTION: Collection = Collection::Payments;
    const LABEL: &'static str = "Payment record";
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ExpenseRecord {
    pub id: i64,
    pub item: String,
    pub category: String,
    pub amount: f64,
    pub date_of_action: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Record for ExpenseRecord {
    const COLLECTION: Collection = Collection::Expenses;
    const LABEL: &'static str = "Expense record";
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    pub priority: String,
    pub phone: String,
    pub trip: String,
    pub package: f64,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Record for CustomerRecord {
    const COLLECTION: Collection = Collection::Customers;
    const LABEL: &'static str = "Customer record";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
#[graphql(rename_items = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Admin => "admin",
        }
    }
}

impl FromStr for Permission {
    type Err = DairyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "admin" => Ok(Permission::Admin),
            other => Err(DairyError::Validation(format!(
                "Unknown permission '{}'. Use read, write or admin.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
#[graphql(rename_items = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// Public view of an account. The password hash never leaves [`UserAccount`].
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub status: AccountStatus,
    pub permission: Permission,
    pub date_joined: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "User";
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    #[serde(flatten)]
    pub user: User,
    pub password: String,
}

impl Record for UserAccount {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "User";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ProductionSummary {
    pub record_count: i64,
    pub total_milk_production: f64,
    /// `None` when the window holds no production records.
    pub average_milk_production: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct PaymentMethodStats {
    pub mpesa: i64,
    pub cash: i64,
    pub other: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct PaymentSummary {
    pub record_count: i64,
    pub gross_earnings: f64,
    pub expected_gross_earnings: f64,
    pub net_earnings: f64,
    pub payment_methods_stats: PaymentMethodStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ExpenseCategoryStats {
    pub rent: i64,
    pub utilities: i64,
    pub salaries_and_wages: i64,
    pub raw_materials: i64,
    pub direct_labor: i64,
    pub manufacturing_overhead: i64,
    pub packaging: i64,
    pub shipping: i64,
    pub other: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ExpenseSummary {
    pub record_count: i64,
    pub total_expenses: f64,
    pub expense_category_stats: ExpenseCategoryStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ReportSummary {
    pub production: ProductionSummary,
    pub payment: PaymentSummary,
    pub expenses: ExpenseSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ReportRecord {
    pub id: i64,
    pub title: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Price per unit the expected earnings were computed with.
    pub market_price: f64,
    pub production: ProductionSummary,
    pub payment: PaymentSummary,
    pub expenses: ExpenseSummary,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Record for ReportRecord {
    const COLLECTION: Collection = Collection::Reports;
    const LABEL: &'static str = "Report";
}
