use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::auth::extract::AuthUser;
use crate::chats::identity::ChatDirectory;
use crate::chats::store::{self, MessageError, NewMessage};
use crate::chats::{chat_or_404, ensure_from_chat, ensure_own, ensure_participant};
use crate::error::{ApiError, ApiResult};

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(chat_id): Path<i64>,
    Query(args): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    let messages = store::messages_of_chat(&db_pool, chat_id, &args).await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "chat_id": chat_id,
        "data": messages,
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessagesBody {
    texts: Vec<String>,
}

/// Sends one message per text. All texts are validated before anything is
/// written, so a bad batch does not land partially.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn send_messages(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    State(chats): State<ChatDirectory>,
    Path(chat_id): Path<i64>,
    Json(SendMessagesBody { texts }): Json<SendMessagesBody>,
) -> ApiResult<Response> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    if texts.is_empty() {
        return Err(ApiError::Validation(
            "It is necessary to put at least one message text".to_owned(),
        ));
    }
    if texts.iter().any(|text| text.is_empty()) {
        return Err(MessageError::EmptyText.into());
    }
    let receiver_id = chat.counterpart_of(user.user_id);
    for text in &texts {
        store::create_message(
            &db_pool,
            &chats,
            NewMessage {
                text,
                sender_id: user.user_id,
                receiver_id,
                chat_id: Some(chat_id),
                datetime_writing: None,
            },
        )
        .await?;
    }
    let message = if texts.len() > 1 {
        "Your messages were successfully sent"
    } else {
        "Your message was successfully sent"
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user.user_id,
            "chat_id": chat_id,
            "message": message,
        })),
    )
        .into_response())
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn message(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path((chat_id, message_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    let message = store::get_message(&db_pool, message_id).await?;
    ensure_from_chat(chat_id, &message)?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "chat_id": chat_id,
        "data": message,
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateMessageBody {
    text: String,
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn update_message(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path((chat_id, message_id)): Path<(i64, i64)>,
    Json(UpdateMessageBody { text }): Json<UpdateMessageBody>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    let message = store::get_message(&db_pool, message_id).await?;
    ensure_from_chat(chat_id, &message)?;
    ensure_own(user.user_id, &message)?;
    store::update_text(&db_pool, message_id, &text).await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "chat_id": chat_id,
        "message_id": message_id,
        "text": text,
        "message": format!("Message {message_id} was successfully updated"),
    })))
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn delete_message(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path((chat_id, message_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Value>> {
    let chat = chat_or_404(&db_pool, chat_id).await?;
    ensure_participant(user.user_id, &chat)?;
    let message = store::get_message(&db_pool, message_id).await?;
    ensure_from_chat(chat_id, &message)?;
    ensure_own(user.user_id, &message)?;
    store::delete_message(&db_pool, message_id).await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "chat_id": chat_id,
        "message_id": message_id,
        "message": format!("Message {message_id} was successfully deleted"),
    })))
}
