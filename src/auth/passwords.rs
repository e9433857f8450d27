use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::auth::token::{self, TokenPurpose};
use crate::auth::validate::{validate_email, validate_password_length};
use crate::auth::{hash, user::User};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::mail::{Email, Mailer};

#[derive(Debug, Deserialize)]
pub(crate) struct ForgotPasswordBody {
    email: String,
}

/// Issues a reset token and mails it out. The mail leaves on its own task;
/// this handler only confirms the dispatch.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn forgot_password(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    State(mailer): State<Mailer>,
    Json(ForgotPasswordBody { email }): Json<ForgotPasswordBody>,
) -> ApiResult<Json<Value>> {
    validate_email(&email)?;
    let Some(user) = User::find_by_email(&db_pool, &email).await? else {
        return Err(ApiError::Validation(
            "User with such an e-mail does not exist".to_owned(),
        ));
    };
    let reset_token = token::issue(
        &db_pool,
        user.user_id,
        TokenPurpose::PasswordReset,
        config.reset_token_expires_in,
    )
    .await?;
    mailer.send(Email {
        to: user.email.clone(),
        subject: "Tetatet reset password".to_owned(),
        text: format!(
            "Hello {}!\n\nTo reset your password, use the token below:\n\n\"{reset_token}\"\n\n\
             If you did not request a password reset, simply ignore this message.",
            user.name
        ),
    });
    Ok(Json(json!({
        "message": "Check your e-mail to reset the password"
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetPasswordBody {
    token: String,
    password: String,
}

/// Consumes the reset token and stores the new credential. Expired and
/// malformed tokens map onto distinct 400 messages here; the token stays
/// unconsumed when the new password itself is rejected.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn reset_password(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Json(ResetPasswordBody { token, password }): Json<ResetPasswordBody>,
) -> ApiResult<Response> {
    validate_password_length(&password, config.required_min_password_length)?;
    let user_id = match token::consume(&db_pool, &token, TokenPurpose::PasswordReset).await {
        Ok(user_id) => user_id,
        Err(ApiError::TokenExpired) => {
            return Err(ApiError::Validation(
                "Reset password token period has expired".to_owned(),
            ));
        }
        Err(ApiError::TokenInvalid) => {
            return Err(ApiError::Validation(
                "Reset password token is not valid".to_owned(),
            ));
        }
        Err(err) => return Err(err),
    };
    User::set_password_hash(&db_pool, user_id, &hash::hash_password(&password)).await?;
    let user = User::by_id(&db_pool, user_id).await?;
    tracing::info!(user_id, "password was reset");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "email": user.email,
            "message": "You password was successfully reset",
        })),
    )
        .into_response())
}
