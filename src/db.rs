use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Logical schema. The unordered-pair uniqueness of `chats` is enforced by
/// always storing the smaller user id in `user1_id`; the unique index backs
/// that invariant at the storage layer.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    date_joined DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS chats (
    chat_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user1_id INTEGER NOT NULL REFERENCES users (user_id),
    user2_id INTEGER NOT NULL REFERENCES users (user_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_pair ON chats (user1_id, user2_id);

CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL REFERENCES chats (chat_id),
    sender_id INTEGER NOT NULL REFERENCES users (user_id),
    receiver_id INTEGER NOT NULL REFERENCES users (user_id),
    text TEXT NOT NULL,
    datetime_writing DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_datetime ON messages (datetime_writing);

CREATE TABLE IF NOT EXISTS tokens (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users (user_id),
    purpose TEXT NOT NULL,
    expires_at DATETIME NOT NULL
);
"#;

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
}

pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// In-memory database for unit tests. A single connection keeps every query
/// on the same `:memory:` instance.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init(&pool).await.unwrap();
    pool
}
