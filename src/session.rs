use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::user::User;
use crate::error::{ApiError, ApiResult};

pub const CURRENT_USER_ID: &str = "current_user_id";
pub const ROOM_NAME: &str = "room_name";
pub const USER_NAME: &str = "user_name";
pub const COMPANION_ID: &str = "companion_id";

/// Resolves the session's logged-in user, if any. A stale id pointing at a
/// user that no longer exists reads as "not logged in" rather than an error.
pub async fn current_user(session: &Session, pool: &SqlitePool) -> ApiResult<Option<User>> {
    let Some(user_id) = session.get::<i64>(CURRENT_USER_ID).await? else {
        return Ok(None);
    };
    match User::by_id(pool, user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
