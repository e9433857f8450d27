use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sqlx::SqlitePool;

use crate::auth::token::{self, TokenPurpose};
use crate::auth::{hash, user::User};
use crate::error::ApiError;

/// The authenticated caller, resolved from the `Authorization` header.
/// Basic auth carries `login:password` (login may be username or email);
/// bearer auth carries an authentication token. A missing header is 403,
/// bad credentials are 401, matching the web surface.
pub struct AuthUser(pub User);

const NO_AUTH: &str = "To access use Basic (base64) or Bearer http authorization";

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let Some(header) = header else {
            return Err(ApiError::Forbidden(NO_AUTH.to_owned()));
        };

        if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = BASE64
                .decode(encoded.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| {
                    ApiError::Unauthorized("Authorization header is not valid".to_owned())
                })?;
            let Some((login, password)) = decoded.split_once(':') else {
                return Err(ApiError::Unauthorized(
                    "Authorization header is not valid".to_owned(),
                ));
            };
            let Some(user) = User::find_by_login(&pool, login).await? else {
                return Err(ApiError::Unauthorized(
                    "Wrong login! Maybe, you have not been registered".to_owned(),
                ));
            };
            if !hash::verify_password(&user.password_hash, password) {
                return Err(ApiError::Unauthorized(
                    "Wrong password! Try again".to_owned(),
                ));
            }
            Ok(AuthUser(user))
        } else if let Some(bearer) = header.strip_prefix("Bearer ") {
            let user_id =
                token::lookup(&pool, bearer.trim(), TokenPurpose::Authentication).await?;
            Ok(AuthUser(User::by_id(&pool, user_id).await?))
        } else {
            Err(ApiError::Forbidden(NO_AUTH.to_owned()))
        }
    }
}
