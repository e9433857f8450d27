use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::auth::extract::AuthUser;
use crate::auth::user::User;
use crate::chats::identity::{self, ChatDirectory};
use crate::chats::listing;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn chats(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> ApiResult<Json<Value>> {
    let chats = identity::chats_of_user(&db_pool, user.user_id).await?;
    Ok(Json(json!({"user_id": user.user_id, "data": chats})))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewChatBody {
    companion_id: i64,
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn new_chat(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(chats): State<ChatDirectory>,
    Json(NewChatBody { companion_id }): Json<NewChatBody>,
) -> ApiResult<Response> {
    if User::find_by_id(&db_pool, companion_id).await?.is_none() {
        return Err(ApiError::Validation(
            "A suggested user does not exist".to_owned(),
        ));
    }
    let chat_id = match chats.create_chat(&db_pool, user.user_id, companion_id).await {
        Ok(chat_id) => chat_id,
        Err(ApiError::Conflict(_)) => {
            return Err(ApiError::Conflict(
                "Your chat with a suggested user already exists".to_owned(),
            ));
        }
        Err(err) => return Err(err),
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user.user_id,
            "companion_id": companion_id,
            "chat_id": chat_id,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverviewQuery {
    page_num: Option<i64>,
}

/// Message-driven chat listing: one row per chat with its latest message and
/// the counterpart's profile, newest first.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn overview(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Query(OverviewQuery { page_num }): Query<OverviewQuery>,
) -> ApiResult<Json<Value>> {
    let page_num = page_num.unwrap_or(1).max(1);
    let limit = config.chats_per_page;
    let offset = (page_num - 1) * limit;
    let rows = listing::user_chats_overview(&db_pool, user.user_id, limit, offset).await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "page_num": page_num,
        "data": rows,
    })))
}
