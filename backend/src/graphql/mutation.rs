use async_graphql::{Context, Object, Result};

use super::{app_state, require};
use crate::commands::customer::{create_customer_record, update_customer_record, CustomerInput, CustomerPatch};
use crate::commands::expense::{create_expense_record, update_expense_record, ExpenseInput, ExpensePatch};
use crate::commands::payment::{create_payment_record, update_payment_record, PaymentInput, PaymentPatch};
use crate::commands::production::{
    create_production_record, update_production_record, ProductionInput, ProductionPatch,
};
use crate::commands::records::delete_record;
use crate::commands::report::{generate_report, ReportWindow};
use crate::commands::user::{self, AuthPayload, NewUserInput, UserPatch};
use crate::commands::utils::parse_timestamp;
use crate::db::{
    CustomerRecord, ExpenseRecord, PaymentRecord, Permission, ProductionRecord, ReportRecord, User,
};

pub struct MutationRoot;

#[Object(rename_fields = "snake_case", rename_args = "snake_case")]
impl MutationRoot {
    async fn create_production_record(
        &self,
        ctx: &Context<'_>,
        input: ProductionInput,
    ) -> Result<ProductionRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(create_production_record(state.store.as_ref(), state.config.utc_offset, input).await?)
    }

    async fn update_production_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: ProductionPatch,
    ) -> Result<ProductionRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(update_production_record(state.store.as_ref(), state.config.utc_offset, id, input).await?)
    }

    async fn delete_production_record(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Write).await?;
        delete_record::<ProductionRecord>(app_state(ctx)?.store.as_ref(), id).await?;
        Ok(true)
    }

    async fn create_payment_record(
        &self,
        ctx: &Context<'_>,
        input: PaymentInput,
    ) -> Result<PaymentRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(create_payment_record(state.store.as_ref(), state.config.utc_offset, input).await?)
    }

    async fn update_payment_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: PaymentPatch,
    ) -> Result<PaymentRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(update_payment_record(state.store.as_ref(), state.config.utc_offset, id, input).await?)
    }

    async fn delete_payment_record(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Write).await?;
        delete_record::<PaymentRecord>(app_state(ctx)?.store.as_ref(), id).await?;
        Ok(true)
    }

    async fn create_customer_record(
        &self,
        ctx: &Context<'_>,
        input: CustomerInput,
    ) -> Result<CustomerRecord> {
        require(ctx, Permission::Write).await?;
        Ok(create_customer_record(app_state(ctx)?.store.as_ref(), input).await?)
    }

    async fn update_customer_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: CustomerPatch,
    ) -> Result<CustomerRecord> {
        require(ctx, Permission::Write).await?;
        Ok(update_customer_record(app_state(ctx)?.store.as_ref(), id, input).await?)
    }

    async fn delete_customer_record(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Write).await?;
        delete_record::<CustomerRecord>(app_state(ctx)?.store.as_ref(), id).await?;
        Ok(true)
    }

    async fn create_expense_record(
        &self,
        ctx: &Context<'_>,
        input: ExpenseInput,
    ) -> Result<ExpenseRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(create_expense_record(state.store.as_ref(), state.config.utc_offset, input).await?)
    }

    async fn update_expense_record(
        &self,
        ctx: &Context<'_>,
        id: i64,
        input: ExpensePatch,
    ) -> Result<ExpenseRecord> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        Ok(update_expense_record(state.store.as_ref(), state.config.utc_offset, id, input).await?)
    }

    async fn delete_expense_record(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Write).await?;
        delete_record::<ExpenseRecord>(app_state(ctx)?.store.as_ref(), id).await?;
        Ok(true)
    }

    /// Open sign-up. New accounts get write permission.
    async fn create_user(&self, ctx: &Context<'_>, input: NewUserInput) -> Result<User> {
        let state = app_state(ctx)?;
        Ok(user::create_user(state.store.as_ref(), &state.config, input).await?)
    }

    async fn authenticate_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<AuthPayload> {
        let state = app_state(ctx)?;
        Ok(user::authenticate_user(state.store.as_ref(), &state.config, &username, &password).await?)
    }

    async fn request_reset(&self, ctx: &Context<'_>, email: String) -> Result<bool> {
        let state = app_state(ctx)?;
        Ok(user::request_reset(
            state.store.as_ref(),
            &state.config,
            state.mailer.as_ref(),
            &email,
        )
        .await?)
    }

    async fn password_reset(
        &self,
        ctx: &Context<'_>,
        token: String,
        new_password: String,
    ) -> Result<bool> {
        let state = app_state(ctx)?;
        Ok(user::password_reset(state.store.as_ref(), &state.config, &token, &new_password).await?)
    }

    async fn update_user(&self, ctx: &Context<'_>, id: i64, input: UserPatch) -> Result<User> {
        require(ctx, Permission::Admin).await?;
        let state = app_state(ctx)?;
        Ok(user::update_user(state.store.as_ref(), &state.config, id, input).await?)
    }

    async fn set_user_permission(
        &self,
        ctx: &Context<'_>,
        id: i64,
        permission: Permission,
    ) -> Result<User> {
        require(ctx, Permission::Admin).await?;
        Ok(user::set_user_permission(app_state(ctx)?.store.as_ref(), id, permission).await?)
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Admin).await?;
        let state = app_state(ctx)?;
        user::delete_user(state.store.as_ref(), &state.config, id).await?;
        Ok(true)
    }

    /// Builds and publishes a report for `[end, start]`. Null when the window
    /// holds no records.
    async fn generate_report(
        &self,
        ctx: &Context<'_>,
        start: String,
        end: String,
    ) -> Result<Option<ReportRecord>> {
        require(ctx, Permission::Write).await?;
        let state = app_state(ctx)?;
        let offset = state.config.utc_offset;
        let window = ReportWindow::new(
            parse_timestamp(&start, offset)?,
            parse_timestamp(&end, offset)?,
        )?;
        Ok(generate_report(state, window).await?)
    }

    async fn delete_auto_reports_record(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        require(ctx, Permission::Write).await?;
        delete_record::<ReportRecord>(app_state(ctx)?.store.as_ref(), id).await?;
        Ok(true)
    }

    async fn set_average_market_price(&self, ctx: &Context<'_>, price: f64) -> Result<f64> {
        let caller = require(ctx, Permission::Admin).await?;
        let price = app_state(ctx)?.market_price.set(price)?;
        tracing::info!(price, by = %caller.username, "average market price changed");
        Ok(price)
    }
}
