use std::sync::{Arc, Mutex};

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::chats::cache::BoundedCache;
use crate::error::{ApiError, ApiResult};

const PAIR_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("A chat between users {0} and {1} already exists")]
    AlreadyExists(i64, i64),
    #[error("There is no chat between users {0} and {1}")]
    NotFound(i64, i64),
    #[error("A user cannot have a chat with themselves")]
    SelfChat,
}

/// Orders a pair of user ids ascending so that every lookup and insert sees
/// the same key regardless of argument order. Self-pairs are rejected.
pub fn canonical_pair(user1_id: i64, user2_id: i64) -> Result<(i64, i64), ChatError> {
    if user1_id == user2_id {
        return Err(ChatError::SelfChat);
    }
    if user1_id < user2_id {
        Ok((user1_id, user2_id))
    } else {
        Ok((user2_id, user1_id))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Chat {
    pub chat_id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
}

impl Chat {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn counterpart_of(&self, user_id: i64) -> i64 {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

pub async fn chat_by_id(pool: &SqlitePool, chat_id: i64) -> ApiResult<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>(
        "SELECT chat_id, user1_id, user2_id FROM chats WHERE chat_id = ?",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    Ok(chat)
}

pub async fn chats_of_user(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<Chat>> {
    let chats = sqlx::query_as::<_, Chat>(
        "SELECT chat_id, user1_id, user2_id FROM chats
         WHERE user1_id = ? OR user2_id = ?
         ORDER BY chat_id",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(chats)
}

/// Canonical existence, creation, deletion and id lookup for the 1:1 chat
/// between two users. Both caches are keyed by the canonical pair; every
/// state-changing operation drops the touched pair from both caches before
/// returning, otherwise a deleted chat could logically come back to life.
#[derive(Clone)]
pub struct ChatDirectory {
    exists: Arc<Mutex<BoundedCache<(i64, i64), bool>>>,
    ids: Arc<Mutex<BoundedCache<(i64, i64), i64>>>,
}

impl Default for ChatDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatDirectory {
    pub fn new() -> Self {
        ChatDirectory {
            exists: Arc::new(Mutex::new(BoundedCache::new(PAIR_CACHE_CAPACITY))),
            ids: Arc::new(Mutex::new(BoundedCache::new(PAIR_CACHE_CAPACITY))),
        }
    }

    pub async fn chat_exists(
        &self,
        pool: &SqlitePool,
        user1_id: i64,
        user2_id: i64,
    ) -> ApiResult<bool> {
        let pair = canonical_pair(user1_id, user2_id)?;
        let cached = self.exists.lock().unwrap().get(&pair);
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chats WHERE user1_id = ? AND user2_id = ?")
                .bind(pair.0)
                .bind(pair.1)
                .fetch_one(pool)
                .await?;
        let found = count > 0;
        self.exists.lock().unwrap().insert(pair, found);
        Ok(found)
    }

    /// Inserts the chat row and returns its id. The pair caches are dropped
    /// after the insert: the row count for this pair just changed.
    pub async fn create_chat(
        &self,
        pool: &SqlitePool,
        user1_id: i64,
        user2_id: i64,
    ) -> ApiResult<i64> {
        let pair = canonical_pair(user1_id, user2_id)?;
        if self.chat_exists(pool, user1_id, user2_id).await? {
            return Err(ChatError::AlreadyExists(pair.0, pair.1).into());
        }
        let result = sqlx::query("INSERT INTO chats (user1_id, user2_id) VALUES (?, ?)")
            .bind(pair.0)
            .bind(pair.1)
            .execute(pool)
            .await?;
        self.invalidate_pair(pair);
        Ok(result.last_insert_rowid())
    }

    pub async fn delete_chat(
        &self,
        pool: &SqlitePool,
        user1_id: i64,
        user2_id: i64,
    ) -> ApiResult<()> {
        let pair = canonical_pair(user1_id, user2_id)?;
        let result = sqlx::query("DELETE FROM chats WHERE user1_id = ? AND user2_id = ?")
            .bind(pair.0)
            .bind(pair.1)
            .execute(pool)
            .await?;
        self.invalidate_pair(pair);
        if result.rows_affected() == 0 {
            return Err(ChatError::NotFound(pair.0, pair.1).into());
        }
        Ok(())
    }

    pub async fn get_chat_id(
        &self,
        pool: &SqlitePool,
        user1_id: i64,
        user2_id: i64,
    ) -> ApiResult<i64> {
        let pair = canonical_pair(user1_id, user2_id)?;
        let cached = self.ids.lock().unwrap().get(&pair);
        if let Some(chat_id) = cached {
            return Ok(chat_id);
        }
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT chat_id FROM chats WHERE user1_id = ? AND user2_id = ?")
                .bind(pair.0)
                .bind(pair.1)
                .fetch_optional(pool)
                .await?;
        let Some((chat_id,)) = row else {
            return Err(ChatError::NotFound(pair.0, pair.1).into());
        };
        self.ids.lock().unwrap().insert(pair, chat_id);
        Ok(chat_id)
    }

    /// Deletion through the REST delete-by-id path. Participants are resolved
    /// first so that the pair caches can be invalidated.
    pub async fn delete_chat_by_id(&self, pool: &SqlitePool, chat_id: i64) -> ApiResult<()> {
        let Some(chat) = chat_by_id(pool, chat_id).await? else {
            return Err(ApiError::NotFound(format!("Chat {chat_id} does not exist")));
        };
        sqlx::query("DELETE FROM chats WHERE chat_id = ?")
            .bind(chat_id)
            .execute(pool)
            .await?;
        self.invalidate_pair((chat.user1_id, chat.user2_id));
        Ok(())
    }

    /// Explicit chat resolution for message construction: returns the id of
    /// the chat between the two users, creating the chat when it is missing.
    pub async fn resolve_or_create_chat(
        &self,
        pool: &SqlitePool,
        sender_id: i64,
        receiver_id: i64,
    ) -> ApiResult<i64> {
        if self.chat_exists(pool, sender_id, receiver_id).await? {
            return self.get_chat_id(pool, sender_id, receiver_id).await;
        }
        self.create_chat(pool, sender_id, receiver_id).await
    }

    fn invalidate_pair(&self, pair: (i64, i64)) {
        self.exists.lock().unwrap().invalidate(&pair);
        self.ids.lock().unwrap().invalidate(&pair);
    }
}
