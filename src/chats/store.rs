use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

use crate::chats::filter;
use crate::chats::identity::ChatDirectory;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message text length cannot be equal to zero")]
    EmptyText,
    #[error("Message {0} does not exist")]
    NotFound(i64),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub datetime_writing: NaiveDateTime,
}

pub struct NewMessage<'a> {
    pub text: &'a str,
    pub sender_id: i64,
    pub receiver_id: i64,
    /// When supplied, must equal the canonical chat id for the pair.
    pub chat_id: Option<i64>,
    /// Defaults to now (UTC).
    pub datetime_writing: Option<NaiveDateTime>,
}

/// Persists one message. Chat resolution is an explicit step: the chat
/// between sender and receiver is looked up, created when missing, and its
/// id recorded on the row. An explicitly supplied id that contradicts the
/// canonical one means the caller itself is corrupt, so that check is an
/// assertion rather than a recoverable error.
pub async fn create_message(
    pool: &SqlitePool,
    chats: &ChatDirectory,
    new: NewMessage<'_>,
) -> ApiResult<Message> {
    if new.text.is_empty() {
        return Err(MessageError::EmptyText.into());
    }
    let resolved = chats
        .resolve_or_create_chat(pool, new.sender_id, new.receiver_id)
        .await?;
    if let Some(chat_id) = new.chat_id {
        assert_eq!(
            chat_id, resolved,
            "chat id {chat_id} does not match the canonical chat {resolved} for users {} and {}",
            new.sender_id, new.receiver_id
        );
    }
    let datetime_writing = new
        .datetime_writing
        .unwrap_or_else(|| Utc::now().naive_utc());
    let result = sqlx::query(
        "INSERT INTO messages (chat_id, sender_id, receiver_id, text, datetime_writing)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(resolved)
    .bind(new.sender_id)
    .bind(new.receiver_id)
    .bind(new.text)
    .bind(datetime_writing)
    .execute(pool)
    .await?;
    Ok(Message {
        message_id: result.last_insert_rowid(),
        chat_id: resolved,
        sender_id: new.sender_id,
        receiver_id: new.receiver_id,
        text: new.text.to_owned(),
        datetime_writing,
    })
}

pub async fn get_message(pool: &SqlitePool, message_id: i64) -> ApiResult<Message> {
    let message = sqlx::query_as::<_, Message>(
        "SELECT message_id, chat_id, sender_id, receiver_id, text, datetime_writing
         FROM messages WHERE message_id = ?",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;
    message.ok_or_else(|| MessageError::NotFound(message_id).into())
}

pub async fn update_text(pool: &SqlitePool, message_id: i64, text: &str) -> ApiResult<()> {
    if text.is_empty() {
        return Err(MessageError::EmptyText.into());
    }
    let result = sqlx::query("UPDATE messages SET text = ? WHERE message_id = ?")
        .bind(text)
        .bind(message_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MessageError::NotFound(message_id).into());
    }
    Ok(())
}

pub async fn delete_message(pool: &SqlitePool, message_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM messages WHERE message_id = ?")
        .bind(message_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MessageError::NotFound(message_id).into());
    }
    Ok(())
}

/// Bulk delete of a chat's messages. Idempotent: a chat with no messages is
/// a no-op.
pub async fn delete_messages_of_chat(pool: &SqlitePool, chat_id: i64) -> ApiResult<()> {
    sqlx::query("DELETE FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Same as [`delete_messages_of_chat`] but addressed by a user pair. A pair
/// with no chat has no messages either, so that case is also a no-op.
pub async fn delete_messages_between(
    pool: &SqlitePool,
    chats: &ChatDirectory,
    user1_id: i64,
    user2_id: i64,
) -> ApiResult<()> {
    match chats.get_chat_id(pool, user1_id, user2_id).await {
        Ok(chat_id) => delete_messages_of_chat(pool, chat_id).await,
        Err(ApiError::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

/// A chat's messages for the REST listing, shaped by the caller's generic
/// filter parameters. The default order is insertion order.
pub async fn messages_of_chat(
    pool: &SqlitePool,
    chat_id: i64,
    args: &HashMap<String, String>,
) -> ApiResult<Vec<Message>> {
    let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT message_id, chat_id, sender_id, receiver_id, text, datetime_writing
         FROM messages WHERE chat_id = ",
    );
    builder.push_bind(chat_id);
    filter::apply(
        &mut builder,
        filter::MESSAGE_COLUMNS,
        args,
        "ORDER BY message_id",
    );
    let messages = builder.build_query_as::<Message>().fetch_all(pool).await?;
    Ok(messages)
}

#[derive(Debug, sqlx::FromRow)]
pub struct BackfillMessage {
    pub sender_id: i64,
    pub text: String,
    pub datetime_writing: NaiveDateTime,
}

/// Reverse-paginated history window between two users, newest first, used by
/// the realtime backfill event.
pub async fn last_messages_between(
    pool: &SqlitePool,
    user_id: i64,
    companion_id: i64,
    offset: i64,
    limit: i64,
) -> ApiResult<Vec<BackfillMessage>> {
    let messages = sqlx::query_as::<_, BackfillMessage>(
        "SELECT sender_id, text, datetime_writing FROM messages
         WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
         ORDER BY datetime_writing DESC
         LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(companion_id)
    .bind(companion_id)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}
