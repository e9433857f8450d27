use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::auth::extract::AuthUser;
use crate::chats::identity::ChatDirectory;
use crate::chats::store;
use crate::chats::{chat_or_404, ensure_participant};
use crate::error::ApiResult;

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn chat(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    Ok(Json(json!({"user_id": user.user_id, "data": chat})))
}

/// Deleting a chat drops all of its messages first, then the chat row itself
/// (which also invalidates the pair caches).
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn delete_chat(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(chats): State<ChatDirectory>,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    store::delete_messages_of_chat(&db_pool, chat_id).await?;
    chats.delete_chat_by_id(&db_pool, chat_id).await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "chat_id": chat_id,
        "message": "Chat was successfully deleted",
    })))
}
