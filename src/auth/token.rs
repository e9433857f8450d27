use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::auth::extract::AuthUser;
use crate::config::Config;
use crate::error::ApiResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is not valid")]
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Authentication,
    PasswordReset,
}

impl TokenPurpose {
    fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::Authentication => "auth",
            TokenPurpose::PasswordReset => "reset",
        }
    }
}

/// Issues an opaque random token bound to the user, valid for `expires_in`
/// seconds.
pub async fn issue(
    pool: &SqlitePool,
    user_id: i64,
    purpose: TokenPurpose,
    expires_in: i64,
) -> ApiResult<String> {
    let bytes: [u8; 32] = rand::rng().random();
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let expires_at = Utc::now().naive_utc() + Duration::seconds(expires_in);
    sqlx::query("INSERT INTO tokens (token, user_id, purpose, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolves a token to its user. Unknown tokens and expired tokens fail
/// differently so callers can tell the two apart; expired rows are removed
/// on sight.
pub async fn lookup(pool: &SqlitePool, token: &str, purpose: TokenPurpose) -> ApiResult<i64> {
    let row: Option<(i64, NaiveDateTime)> =
        sqlx::query_as("SELECT user_id, expires_at FROM tokens WHERE token = ? AND purpose = ?")
            .bind(token)
            .bind(purpose.as_str())
            .fetch_optional(pool)
            .await?;
    let Some((user_id, expires_at)) = row else {
        return Err(TokenError::Invalid.into());
    };
    if expires_at < Utc::now().naive_utc() {
        sqlx::query("DELETE FROM tokens WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;
        return Err(TokenError::Expired.into());
    }
    Ok(user_id)
}

/// Single-use resolution: the token row is deleted once it has matched.
/// Password reset tokens go through here.
pub async fn consume(pool: &SqlitePool, token: &str, purpose: TokenPurpose) -> ApiResult<i64> {
    let user_id = lookup(pool, token, purpose).await?;
    sqlx::query("DELETE FROM tokens WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(user_id)
}

/// `GET /token`: hands an authentication token to a user who proved their
/// identity (usually via basic auth), so credentials are not resent on every
/// request.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn issue_token(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
) -> ApiResult<Json<Value>> {
    let token = issue(
        &db_pool,
        user.user_id,
        TokenPurpose::Authentication,
        config.auth_token_expires_in,
    )
    .await?;
    Ok(Json(json!({
        "token": token,
        "expires_in": config.auth_token_expires_in,
    })))
}
