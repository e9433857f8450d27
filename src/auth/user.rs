use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: NaiveDateTime,
}

/// The profile fields other users are allowed to see: no email, no
/// credential.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicUser {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub date_joined: NaiveDateTime,
}

const USER_FIELDS: &str = "user_id, username, email, name, password_hash, date_joined";

impl User {
    pub async fn by_id(pool: &SqlitePool, user_id: i64) -> ApiResult<User> {
        Self::find_by_id(pool, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {user_id} does not exist")))
    }

    pub async fn find_by_id(pool: &SqlitePool, user_id: i64) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Basic auth allows either the username or the email as the login.
    pub async fn find_by_login(pool: &SqlitePool, login: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE username = ? OR email = ?"
        ))
        .bind(login)
        .bind(login)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn insert(
        pool: &SqlitePool,
        email: &str,
        username: &str,
        name: &str,
        password_hash: &str,
    ) -> ApiResult<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, name, password_hash, date_joined)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_password_hash(
        pool: &SqlitePool,
        user_id: i64,
        password_hash: &str,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
