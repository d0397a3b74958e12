use async_graphql::{Context, Object, Result};

use super::{app_state, require};
use crate::commands::records::{get_all_records, get_record};
use crate::commands::report::{fetch_window, summarize, ReportWindow};
use crate::commands::utils::parse_timestamp;
use crate::db::{
    CustomerRecord, ExpenseRecord, PaymentRecord, Permission, ProductionRecord, ReportRecord,
    ReportSummary, User,
};

pub struct QueryRoot;

#[Object(rename_fields = "snake_case", rename_args = "snake_case")]
impl QueryRoot {
    async fn get_all_production_records(&self, ctx: &Context<'_>) -> Result<Vec<ProductionRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_production_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
    ) -> Result<Option<ProductionRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    async fn get_all_payment_records(&self, ctx: &Context<'_>) -> Result<Vec<PaymentRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_payment_record(&self, ctx: &Context<'_>, id: i64) -> Result<Option<PaymentRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    async fn get_all_customer_records(&self, ctx: &Context<'_>) -> Result<Vec<CustomerRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_customer_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
    ) -> Result<Option<CustomerRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    async fn get_all_expense_records(&self, ctx: &Context<'_>) -> Result<Vec<ExpenseRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_expense_record(&self, ctx: &Context<'_>, id: i64) -> Result<Option<ExpenseRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    async fn get_all_users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        require(ctx, Permission::Admin).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_user(&self, ctx: &Context<'_>, id: i64) -> Result<Option<User>> {
        let caller = require(ctx, Permission::Read).await?;
        if caller.id != id {
            caller.require(Permission::Admin)?;
        }
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    /// The account behind the bearer token.
    async fn current_user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let caller = require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), caller.id).await?)
    }

    async fn get_all_auto_reports_records(&self, ctx: &Context<'_>) -> Result<Vec<ReportRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_all_records(app_state(ctx)?.store.as_ref()).await?)
    }

    async fn get_auto_reports_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
    ) -> Result<Option<ReportRecord>> {
        require(ctx, Permission::Read).await?;
        Ok(get_record(app_state(ctx)?.store.as_ref(), id).await?)
    }

    /// Computes a summary for `[end, start]` without storing it.
    async fn report_summary(
        &self,
        ctx: &Context<'_>,
        start: String,
        end: String,
    ) -> Result<ReportSummary> {
        require(ctx, Permission::Read).await?;
        let state = app_state(ctx)?;
        let offset = state.config.utc_offset;
        let window = ReportWindow::new(
            parse_timestamp(&start, offset)?,
            parse_timestamp(&end, offset)?,
        )?;
        let records = fetch_window(state.store.as_ref(), window).await?;
        Ok(summarize(&records, state.market_price.get()))
    }

    async fn average_market_price(&self, ctx: &Context<'_>) -> Result<f64> {
        require(ctx, Permission::Read).await?;
        Ok(app_state(ctx)?.market_price.get())
    }
}
