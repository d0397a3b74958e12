use async_graphql::{InputObject, SimpleObject};
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::notify::Notifier;
use crate::commands::records::{
    delete_record, find_records, get_record, insert_record, patch_record,
};
use crate::commands::utils::{required_text, to_fields, PatchBuilder};
use crate::config::AppConfig;
use crate::db::{AccountStatus, Permission, User, UserAccount};
use crate::error::{DairyError, DairyResult};
use crate::middleware::auth::{decode_reset_token, issue_reset_token, issue_token};
use crate::store::DocumentStore;

pub const WRONG_CREDENTIALS: &str = "Entered wrong password or username.";
pub const USER_EXISTS: &str = "User already exists.";

#[derive(Debug, Clone, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct NewUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, InputObject)]
#[graphql(rename_fields = "snake_case")]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<AccountStatus>,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct AuthPayload {
    pub authenticated: bool,
    pub token: Option<String>,
}

#[derive(Serialize)]
struct UserDoc {
    username: String,
    email: String,
    password: String,
    status: AccountStatus,
    permission: Permission,
    date_joined: DateTime<Utc>,
}

fn valid_email(raw: &str) -> DairyResult<String> {
    let email = required_text("email", raw)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(DairyError::Validation(format!("'{}' is not an email address.", email))),
    }
}

fn valid_password(raw: &str) -> DairyResult<&str> {
    if raw.trim().is_empty() {
        return Err(DairyError::Validation("password must not be empty.".to_string()));
    }
    Ok(raw)
}

async fn find_account(
    store: &dyn DocumentStore,
    field: &str,
    value: &str,
) -> DairyResult<Option<UserAccount>> {
    Ok(find_records::<UserAccount>(store, field, value)
        .await?
        .into_iter()
        .next())
}

/// Fails with `Duplicate` if another account already uses the username or email.
async fn ensure_unique(
    store: &dyn DocumentStore,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> DairyResult<()> {
    for (field, value) in [("username", username), ("email", email)] {
        let Some(value) = value else { continue };
        let clash = find_records::<User>(store, field, value)
            .await?
            .into_iter()
            .any(|user| Some(user.id) != except);
        if clash {
            return Err(DairyError::Duplicate(USER_EXISTS.to_string()));
        }
    }
    Ok(())
}

async fn insert_user(
    store: &dyn DocumentStore,
    config: &AppConfig,
    input: NewUserInput,
    permission: Permission,
) -> DairyResult<User> {
    let username = required_text("username", &input.username)?;
    let email = valid_email(&input.email)?;
    let password = valid_password(&input.password)?;

    ensure_unique(store, Some(&username), Some(&email), None).await?;

    let doc = UserDoc {
        username,
        email,
        password: hash(password, config.bcrypt_cost)?,
        status: AccountStatus::Active,
        permission,
        date_joined: Utc::now(),
    };
    let user: User = insert_record(store, to_fields(&doc)?).await?;
    tracing::info!(id = user.id, username = %user.username, "user created");
    Ok(user)
}

pub async fn create_user(
    store: &dyn DocumentStore,
    config: &AppConfig,
    input: NewUserInput,
) -> DairyResult<User> {
    insert_user(store, config, input, Permission::Write).await
}

pub async fn authenticate_user(
    store: &dyn DocumentStore,
    config: &AppConfig,
    username: &str,
    password: &str,
) -> DairyResult<AuthPayload> {
    let account = find_account(store, "username", username.trim())
        .await?
        .ok_or_else(|| DairyError::Auth(WRONG_CREDENTIALS.to_string()))?;

    if !verify(password, &account.password)? {
        tracing::info!(username = %account.user.username, "failed login");
        return Err(DairyError::Auth(WRONG_CREDENTIALS.to_string()));
    }
    if account.user.status == AccountStatus::Suspended {
        return Err(DairyError::Forbidden(
            "Your account has been suspended.".to_string(),
        ));
    }

    Ok(AuthPayload {
        authenticated: true,
        token: Some(issue_token(config, &account.user)?),
    })
}

/// Sends a reset link to the account's address. Unknown addresses get the
/// same answer so the endpoint cannot be used to probe for accounts.
pub async fn request_reset(
    store: &dyn DocumentStore,
    config: &AppConfig,
    notifier: &dyn Notifier,
    email: &str,
) -> DairyResult<bool> {
    let email = valid_email(email)?;
    let Some(account) = find_account(store, "email", &email).await? else {
        tracing::info!(email = %email, "password reset requested for unknown address");
        return Ok(true);
    };

    let token = issue_reset_token(config, &account.user)?;
    let message = format!(
        "A password reset was requested for {}. Use this link within {} minutes: {}/reset/{}",
        account.user.username,
        config.reset_token_ttl_minutes,
        config.link_base(),
        token
    );
    if let Err(e) = notifier.send(&account.user.email, &message).await {
        tracing::warn!(channel = notifier.channel(), error = %e, "reset link not delivered");
    }
    Ok(true)
}

pub async fn password_reset(
    store: &dyn DocumentStore,
    config: &AppConfig,
    token: &str,
    new_password: &str,
) -> DairyResult<bool> {
    let claims = decode_reset_token(config, token)?;
    let id: i64 = claims
        .sub
        .parse()
        .map_err(|_| DairyError::Auth("Invalid or expired reset token.".to_string()))?;

    let user: User = get_record(store, id)
        .await?
        .filter(|user: &User| user.email == claims.email)
        .ok_or_else(|| DairyError::Auth("Invalid or expired reset token.".to_string()))?;

    let mut fields = PatchBuilder::new();
    fields.text("password", Some(hash(valid_password(new_password)?, config.bcrypt_cost)?));
    patch_record::<User>(store, user.id, fields.finish()?).await?;
    tracing::info!(id = user.id, "password reset");
    Ok(true)
}

pub async fn update_user(
    store: &dyn DocumentStore,
    config: &AppConfig,
    id: i64,
    patch: UserPatch,
) -> DairyResult<User> {
    let username = patch
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let email = match patch.email.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(raw) => Some(valid_email(raw)?),
        None => None,
    };
    ensure_unique(store, username.as_deref(), email.as_deref(), Some(id)).await?;

    let mut fields = PatchBuilder::new();
    fields.text("username", username).text("email", email);
    if let Some(password) = patch.password.filter(|p| !p.trim().is_empty()) {
        fields.text("password", Some(hash(password, config.bcrypt_cost)?));
    }
    if let Some(status) = patch.status {
        fields.value("status", serde_json::to_value(status)?);
    }
    patch_record(store, id, fields.finish()?).await
}

pub async fn set_user_permission(
    store: &dyn DocumentStore,
    id: i64,
    permission: Permission,
) -> DairyResult<User> {
    let mut fields = PatchBuilder::new();
    fields.value("permission", serde_json::to_value(permission)?);
    let user: User = patch_record(store, id, fields.finish()?).await?;
    tracing::info!(id, permission = permission.as_str(), "permission changed");
    Ok(user)
}

pub async fn delete_user(store: &dyn DocumentStore, config: &AppConfig, id: i64) -> DairyResult<()> {
    if let Some(user) = get_record::<User>(store, id).await? {
        if user.username == config.admin_user {
            return Err(DairyError::Forbidden(
                "The admin account cannot be deleted.".to_string(),
            ));
        }
    }
    delete_record::<User>(store, id).await
}

/// Seeds the administrator account on first start.
pub async fn ensure_admin(store: &dyn DocumentStore, config: &AppConfig) -> DairyResult<()> {
    if find_account(store, "username", &config.admin_user).await?.is_some() {
        return Ok(());
    }
    let input = NewUserInput {
        username: config.admin_user.clone(),
        email: config.admin_email.clone(),
        password: config.admin_password.clone(),
    };
    insert_user(store, config, input, Permission::Admin).await?;
    tracing::info!(username = %config.admin_user, "seeded admin account");
    Ok(())
}

/// Checks the password privileged bot commands carry against the admin account.
pub async fn verify_admin_password(
    store: &dyn DocumentStore,
    config: &AppConfig,
    password: &str,
) -> DairyResult<bool> {
    match find_account(store, "username", &config.admin_user).await? {
        Some(admin) => Ok(verify(password, &admin.password)?),
        None => Ok(false),
    }
}
