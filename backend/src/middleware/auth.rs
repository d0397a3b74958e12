use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::commands::records::get_record;
use crate::config::AppConfig;
use crate::db::{AccountStatus, Permission, User};
use crate::error::{DairyError, DairyResult};
use crate::state::AppState;

pub const MISSING_HEADER: &str = "Access denied. Could not authenticate.";
pub const MISSING_BEARER: &str = "Your authorization header must begin with 'Bearer'.";
pub const INVALID_TOKEN: &str = "Invalid authentication token.";

const RESET_PURPOSE: &str = "reset";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub username: String,
    pub permission: Permission,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetClaims {
    pub sub: String,
    pub email: String,
    pub purpose: String,
    pub exp: i64,
}

/// The caller behind a verified bearer token. Permission and status come
/// from the stored account, not from the token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub permission: Permission,
}

impl AuthUser {
    pub fn require(&self, needed: Permission) -> DairyResult<()> {
        if self.permission < needed {
            return Err(DairyError::Forbidden(format!(
                "This operation requires {} permission.",
                needed.as_str()
            )));
        }
        Ok(())
    }
}

fn sign<T: Serialize>(config: &AppConfig, claims: &T) -> DairyResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(&config.jwt_secret),
    )
    .map_err(|e| DairyError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn issue_token(config: &AppConfig, user: &User) -> DairyResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        permission: user.permission,
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
    };
    sign(config, &claims)
}

pub fn decode_token(config: &AppConfig, token: &str) -> DairyResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&config.jwt_secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        DairyError::Auth(INVALID_TOKEN.to_string())
    })
}

pub fn issue_reset_token(config: &AppConfig, user: &User) -> DairyResult<String> {
    let claims = ResetClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        purpose: RESET_PURPOSE.to_string(),
        exp: (Utc::now() + Duration::minutes(config.reset_token_ttl_minutes)).timestamp(),
    };
    sign(config, &claims)
}

pub fn decode_reset_token(config: &AppConfig, token: &str) -> DairyResult<ResetClaims> {
    let claims = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(&config.jwt_secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| DairyError::Auth("Invalid or expired reset token.".to_string()))?;

    if claims.purpose != RESET_PURPOSE {
        return Err(DairyError::Auth("Invalid or expired reset token.".to_string()));
    }
    Ok(claims)
}

pub fn bearer_token(header: Option<&str>) -> DairyResult<&str> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DairyError::Auth(MISSING_HEADER.to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| DairyError::Auth(MISSING_BEARER.to_string()))
}

/// Verifies the bearer credential and resolves it against the stored account.
pub async fn authorize(state: &AppState, header: Option<&str>) -> DairyResult<AuthUser> {
    let token = bearer_token(header)?;
    let claims = decode_token(&state.config, token)?;

    let id: i64 = claims
        .sub
        .parse()
        .map_err(|_| DairyError::Auth(INVALID_TOKEN.to_string()))?;

    let user: User = get_record(state.store.as_ref(), id)
        .await?
        .filter(|user: &User| user.email == claims.email)
        .ok_or_else(|| DairyError::Auth(INVALID_TOKEN.to_string()))?;

    if user.status == AccountStatus::Suspended {
        return Err(DairyError::Forbidden(
            "Your account has been suspended.".to_string(),
        ));
    }

    Ok(AuthUser {
        id: user.id,
        username: user.username,
        email: user.email,
        permission: user.permission,
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, DairyError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let user = authorize(&state, header.as_deref()).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "wanjiku".to_string(),
            email: "w@farm.test".to_string(),
            status: AccountStatus::Active,
            permission: Permission::Write,
            date_joined: now,
            created_on: now,
            updated_on: now,
        }
    }

    #[test]
    fn test_bearer_header_shapes() {
        assert_eq!(
            bearer_token(None).unwrap_err().to_string(),
            MISSING_HEADER
        );
        assert_eq!(
            bearer_token(Some("Token abc")).unwrap_err().to_string(),
            MISSING_BEARER
        );
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_token_round_trip_and_wrong_secret() {
        let config = AppConfig::default();
        let token = issue_token(&config, &sample_user()).unwrap();
        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.permission, Permission::Write);

        let other = AppConfig {
            jwt_secret: b"another-secret".to_vec(),
            ..AppConfig::default()
        };
        assert!(matches!(
            decode_token(&other, &token),
            Err(DairyError::Auth(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = AppConfig {
            token_ttl_hours: -2,
            ..AppConfig::default()
        };
        let token = issue_token(&config, &sample_user()).unwrap();
        let err = decode_token(&config, &token).unwrap_err();
        assert_eq!(err.to_string(), INVALID_TOKEN);
    }

    #[test]
    fn test_login_and_reset_tokens_are_not_interchangeable() {
        let config = AppConfig::default();
        let login = issue_token(&config, &sample_user()).unwrap();
        let reset = issue_reset_token(&config, &sample_user()).unwrap();

        assert!(decode_reset_token(&config, &login).is_err());
        assert!(decode_token(&config, &reset).is_err());
        assert_eq!(decode_reset_token(&config, &reset).unwrap().email, "w@farm.test");
    }

    #[test]
    fn test_permission_ordering() {
        let reader = AuthUser {
            id: 1,
            username: "r".to_string(),
            email: "r@farm.test".to_string(),
            permission: Permission::Read,
        };
        assert!(reader.require(Permission::Read).is_ok());
        assert!(matches!(
            reader.require(Permission::Write),
            Err(DairyError::Forbidden(_))
        ));
    }
}
