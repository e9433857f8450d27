mod cache;
mod chat;
pub mod filter;
pub mod identity;
mod list;
pub mod listing;
mod msg;
mod rooms;
pub mod store;
mod ws;

use axum::Router;
use axum::routing::get;
use sqlx::SqlitePool;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub use identity::{Chat, ChatDirectory, ChatError, canonical_pair};
pub use rooms::RoomHub;
pub use store::{Message, MessageError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chats", get(list::chats).post(list::new_chat))
        .route("/chats/overview", get(list::overview))
        .route("/chats/begin/{username}", get(ws::begin))
        .route("/chats/end", get(ws::end))
        .route("/chats/going/ws", get(ws::chat_ws))
        .route("/chats/{chat_id}", get(chat::chat).delete(chat::delete_chat))
        .route(
            "/chats/{chat_id}/messages",
            get(msg::messages).post(msg::send_messages),
        )
        .route(
            "/chats/{chat_id}/messages/{message_id}",
            get(msg::message)
                .put(msg::update_message)
                .delete(msg::delete_message),
        )
}

pub(crate) async fn chat_or_404(pool: &SqlitePool, chat_id: i64) -> ApiResult<Chat> {
    identity::chat_by_id(pool, chat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("A chat with such an id is not found".to_owned()))
}

pub(crate) fn ensure_participant(user_id: i64, chat: &Chat) -> ApiResult<()> {
    if !chat.has_participant(user_id) {
        return Err(ApiError::Forbidden(format!(
            "You are not a participant of this chat {}",
            chat.chat_id
        )));
    }
    Ok(())
}

pub(crate) fn ensure_from_chat(chat_id: i64, message: &Message) -> ApiResult<()> {
    if message.chat_id != chat_id {
        return Err(ApiError::Forbidden(format!(
            "Message {} is not from the chat {chat_id}",
            message.message_id
        )));
    }
    Ok(())
}

pub(crate) fn ensure_own(user_id: i64, message: &Message) -> ApiResult<()> {
    if message.sender_id != user_id {
        return Err(ApiError::Forbidden(format!(
            "Message {} does not belong to you",
            message.message_id
        )));
    }
    Ok(())
}
