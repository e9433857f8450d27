use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;

use crate::auth::extract::AuthUser;
use crate::auth::user::User;
use crate::auth::validate::validate_length;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateBody {
    username: Option<String>,
    name: Option<String>,
}

/// Profile update. Echoes back exactly the fields that actually changed;
/// submitting only current values is an error, not a silent success.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn update(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Response> {
    let mut changed = Map::new();

    if let Some(username) = &body.username {
        if *username != user.username {
            validate_length(
                username,
                3,
                25,
                "Username length must be between 3 and 25 chars",
            )?;
            if User::find_by_username(&db_pool, username).await?.is_some() {
                return Err(ApiError::Conflict(
                    "This username is busy! Try putting another one".to_owned(),
                ));
            }
            sqlx::query("UPDATE users SET username = ? WHERE user_id = ?")
                .bind(username)
                .bind(user.user_id)
                .execute(&db_pool)
                .await?;
            changed.insert("username".to_owned(), json!(username));
        }
    }

    if let Some(name) = &body.name {
        if *name != user.name {
            validate_length(name, 3, 25, "Name length must be between 3 and 25 chars")?;
            sqlx::query("UPDATE users SET name = ? WHERE user_id = ?")
                .bind(name)
                .bind(user.user_id)
                .execute(&db_pool)
                .await?;
            changed.insert("name".to_owned(), json!(name));
        }
    }

    if changed.is_empty() {
        return Err(ApiError::Validation("Nothing was updated".to_owned()));
    }
    Ok((StatusCode::ACCEPTED, Json(Value::Object(changed))).into_response())
}
