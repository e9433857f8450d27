use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::{hash, user::User};
use crate::error::{ApiError, ApiResult};
use crate::session;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: String,
    password: String,
}

/// Browser-session login: stores the user's id in the session so the chat
/// pages and the realtime channel can recognize the caller.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(LoginBody { email, password }): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    let Some(user) = User::find_by_email(&db_pool, &email).await? else {
        return Err(ApiError::Unauthorized(
            "Wrong email! Maybe, you have not registered".to_owned(),
        ));
    };
    if !hash::verify_password(&user.password_hash, &password) {
        return Err(ApiError::Unauthorized(
            "Wrong password! Try again".to_owned(),
        ));
    }
    session
        .insert(session::CURRENT_USER_ID, user.user_id)
        .await?;
    Ok(Json(json!({
        "message": "Successfully logged in!",
        "user_id": user.user_id,
    })))
}

pub(crate) async fn logout(session: Session) -> ApiResult<Json<Value>> {
    session.clear().await;
    Ok(Json(json!({"message": "Logged out"})))
}
