use std::collections::HashMap;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use serde_json::{Value, json};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::AppState;
use crate::auth::extract::AuthUser;
use crate::auth::user::PublicUser;
use crate::chats::filter;
use crate::error::{ApiError, ApiResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/{user_id}", get(single))
}

/// User directory. The same generic filter parameters as the message
/// listing apply, which is also how the companion search works
/// (`?username-like=...`).
#[axum::debug_handler(state = crate::AppState)]
async fn list(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Query(args): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let mut builder: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT user_id, username, name, date_joined FROM users WHERE 1 = 1");
    filter::apply(&mut builder, filter::USER_COLUMNS, &args, "ORDER BY user_id");
    let users = builder
        .build_query_as::<PublicUser>()
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(json!({"user_id": user.user_id, "data": users})))
}

#[axum::debug_handler(state = crate::AppState)]
async fn single(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let target = sqlx::query_as::<_, PublicUser>(
        "SELECT user_id, username, name, date_joined FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("User {user_id} does not exist")))?;
    Ok(Json(json!({"user_id": user.user_id, "data": target})))
}
