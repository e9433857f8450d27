use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ApiResult;

/// One row of the "my chats" listing: the counterpart's identity plus the
/// chat's most recent message. Chats without a single message do not appear
/// here; the listing is driven by messages, not by chat rows.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatOverview {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub text: String,
    pub datetime_writing: NaiveDateTime,
}

/// Most recent message per chat for the given user, newest chat first.
/// Groups the user's messages by chat, takes the per-chat max writing time
/// and joins back for the message text and the counterpart's profile.
pub async fn user_chats_overview(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<ChatOverview>> {
    let rows = sqlx::query_as::<_, ChatOverview>(
        "SELECT u.user_id, u.username, u.name, m.text, m.datetime_writing
         FROM messages m
         JOIN (
             SELECT chat_id, MAX(datetime_writing) AS max_datetime
             FROM messages
             WHERE sender_id = ? OR receiver_id = ?
             GROUP BY chat_id
         ) last ON m.chat_id = last.chat_id AND m.datetime_writing = last.max_datetime
         JOIN users u
             ON u.user_id = CASE WHEN m.receiver_id = ? THEN m.sender_id ELSE m.receiver_id END
         ORDER BY m.datetime_writing DESC
         LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
