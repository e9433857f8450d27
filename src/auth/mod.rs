pub mod extract;
pub mod hash;
mod login;
mod passwords;
mod register;
pub mod token;
mod update;
pub mod user;
pub mod validate;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

pub use extract::AuthUser;
pub use user::{PublicUser, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/token", get(token::issue_token))
        .route("/forgot-password", post(passwords::forgot_password))
        .route("/reset-password", post(passwords::reset_password))
        .route("/update", post(update::update))
        .route("/login", post(login::login))
        .route("/logout", get(login::logout))
}
