use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::auth::validate::{validate_email, validate_length, validate_password_length};
use crate::auth::{hash, user::User};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterBody {
    email: String,
    username: String,
    name: String,
    password: String,
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<Response> {
    validate_email(&body.email)?;
    validate_length(
        &body.username,
        3,
        25,
        "Username length must be between 3 and 25 chars",
    )?;
    validate_length(&body.name, 3, 25, "Name length must be between 3 and 25 chars")?;
    validate_password_length(&body.password, config.required_min_password_length)?;

    if User::find_by_email(&db_pool, &body.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with such an email has been registered!".to_owned(),
        ));
    }
    if User::find_by_username(&db_pool, &body.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This username is busy! Try putting another one".to_owned(),
        ));
    }

    let user_id = User::insert(
        &db_pool,
        &body.email,
        &body.username,
        &body.name,
        &hash::hash_password(&body.password),
    )
    .await?;
    tracing::info!(user_id, username = %body.username, "new user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "Successfully registered!"})),
    )
        .into_response())
}
