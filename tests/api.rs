//! End-to-end tests over the full router, driven in-process.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use tetatet::config::Config;
use tetatet::mail::{Mailbox, Mailer};
use tetatet::{AppState, db};

async fn spawn_app() -> (Router, Mailbox) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init(&pool).await.unwrap();
    let (mailer, mailbox) = Mailer::capture();
    let app = tetatet::router(AppState::new(pool, mailer, Config::default()));
    (app, mailbox)
}

struct TestResponse {
    status: StatusCode,
    body: Value,
    cookie: Option<String>,
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth: Option<&str>,
    cookie: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, body, cookie }
}

fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{email}:{password}")))
}

async fn register(app: &Router, n: u32) {
    let response = send(
        app,
        "POST",
        "/register",
        Some(json!({
            "email": format!("user{n}@example.com"),
            "username": format!("username{n}"),
            "name": format!("name{n}"),
            "password": "12345678",
        })),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

fn auth_for(n: u32) -> String {
    basic(&format!("user{n}@example.com"), "12345678")
}

#[tokio::test]
async fn register_validates_every_field() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;

    let cases = [
        // taken email
        json!({"email": "user1@example.com", "username": "other", "name": "other name", "password": "12345678"}),
        // taken username
        json!({"email": "other@example.com", "username": "username1", "name": "other name", "password": "12345678"}),
        // invalid email
        json!({"email": "user-example.com", "username": "fresh", "name": "fresh name", "password": "12345678"}),
        // short username
        json!({"email": "fresh@example.com", "username": "ab", "name": "fresh name", "password": "12345678"}),
        // short name
        json!({"email": "fresh@example.com", "username": "fresh", "name": "ab", "password": "12345678"}),
        // short password
        json!({"email": "fresh@example.com", "username": "fresh", "name": "fresh name", "password": "1234567"}),
    ];
    for body in cases {
        let response = send(&app, "POST", "/register", Some(body.clone()), None, None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "accepted: {body}");
    }
}

#[tokio::test]
async fn token_flow() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;

    // username works as the basic login too
    let response = send(
        &app,
        "GET",
        "/token",
        None,
        Some(&basic("username1", "12345678")),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["expires_in"], 3600);
    let token = response.body["token"].as_str().unwrap().to_owned();

    // the token authenticates requests, including another /token call
    let bearer = format!("Bearer {token}");
    let response = send(&app, "GET", "/token", None, Some(&bearer), None).await;
    assert_eq!(response.status, StatusCode::OK);

    // garbage token is rejected with the "not valid" message
    let response = send(&app, "GET", "/users", None, Some("Bearer garbage"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Authentication token is not valid");

    // no header at all is 403
    let response = send(&app, "GET", "/users", None, None, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // wrong password is 401
    let response = send(
        &app,
        "GET",
        "/token",
        None,
        Some(&basic("user1@example.com", "wrong")),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_and_reset_password() {
    let (app, mailbox) = spawn_app().await;
    register(&app, 1).await;

    let response = send(
        &app,
        "POST",
        "/forgot-password",
        Some(json!({"email": "nobody@example.com"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        "POST",
        "/forgot-password",
        Some(json!({"email": "user1@example.com"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let token = {
        let sent = mailbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user1@example.com");
        // the token is quoted in the mail body
        sent[0].text.split('"').nth(1).unwrap().to_owned()
    };

    // a weak replacement password is rejected and does not burn the token
    let response = send(
        &app,
        "POST",
        "/reset-password",
        Some(json!({"token": token, "password": "short"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        "POST",
        "/reset-password",
        Some(json!({"token": token, "password": "87654321"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["email"], "user1@example.com");

    // the token is single-use
    let response = send(
        &app,
        "POST",
        "/reset-password",
        Some(json!({"token": token, "password": "87654321"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // old credential is gone, the new one works
    let response = send(
        &app,
        "GET",
        "/token",
        None,
        Some(&basic("user1@example.com", "12345678")),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let response = send(
        &app,
        "GET",
        "/token",
        None,
        Some(&basic("user1@example.com", "87654321")),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn update_profile() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;
    let auth = auth_for(1);

    let response = send(
        &app,
        "POST",
        "/update",
        Some(json!({"name": "new name"})),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["name"], "new name");
    assert!(response.body.get("username").is_none());

    let response = send(
        &app,
        "POST",
        "/update",
        Some(json!({"username": "renamed", "name": "newer name"})),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["username"], "renamed");
    assert_eq!(response.body["name"], "newer name");

    // submitting only current values changes nothing
    let response = send(
        &app,
        "POST",
        "/update",
        Some(json!({"name": "newer name"})),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Nothing was updated");
}

#[tokio::test]
async fn users_listing_and_detail() {
    let (app, _) = spawn_app().await;
    for n in 1..=3 {
        register(&app, n).await;
    }
    let auth = auth_for(3);

    let response = send(&app, "GET", "/users", None, Some(&auth), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user_id"], 3);
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["username"], "username1");
    assert!(data[0].get("password_hash").is_none());
    assert!(data[0].get("email").is_none());

    // generic filter params drive the companion search
    let response = send(
        &app,
        "GET",
        "/users?username-like=name2",
        None,
        Some(&auth),
        None,
    )
    .await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["username"], "username2");

    let response = send(&app, "GET", "/users/2", None, Some(&auth), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["username"], "username2");

    let response = send(&app, "GET", "/users/9", None, Some(&auth), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_lifecycle_end_to_end() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;
    register(&app, 2).await;
    let ann = auth_for(1);
    let bob = auth_for(2);

    // A starts the chat with B
    let response = send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 2})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["user_id"], 1);
    assert_eq!(response.body["companion_id"], 2);
    assert_eq!(response.body["chat_id"], 1);

    // B cannot re-create it, in either direction
    let response = send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 1})),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // unknown companion and self-chat are both rejected
    let response = send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 9})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let response = send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 1})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // both participants see the chat in their listings
    for auth in [&ann, &bob] {
        let response = send(&app, "GET", "/chats", None, Some(auth), None).await;
        assert_eq!(response.status, StatusCode::OK);
        let data = response.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["chat_id"], 1);
        assert_eq!(data[0]["user1_id"], 1);
        assert_eq!(data[0]["user2_id"], 2);
    }

    // A sends two messages in one request
    let response = send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["Hello!", "How are you?"]})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = send(&app, "GET", "/chats/1/messages", None, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::OK);
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["text"], "Hello!");
    assert_eq!(data[1]["text"], "How are you?");
    assert_eq!(data[0]["sender_id"], 1);
    assert_eq!(data[0]["receiver_id"], 2);

    // B deletes the chat; it and its messages are gone for both
    let response = send(&app, "DELETE", "/chats/1", None, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::OK);
    for auth in [&ann, &bob] {
        let response = send(&app, "GET", "/chats/1", None, Some(auth), None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
    let response = send(&app, "GET", "/chats", None, Some(&ann), None).await;
    assert!(response.body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn chat_access_is_participants_only() {
    let (app, _) = spawn_app().await;
    for n in 1..=3 {
        register(&app, n).await;
    }
    let ann = auth_for(1);
    let eve = auth_for(3);

    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 2})),
        Some(&ann),
        None,
    )
    .await;

    let response = send(&app, "GET", "/chats/1", None, Some(&eve), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(&app, "DELETE", "/chats/1", None, Some(&eve), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(&app, "GET", "/chats/1/messages", None, Some(&eve), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(&app, "GET", "/chats/9", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_crud_and_ownership() {
    let (app, _) = spawn_app().await;
    for n in 1..=3 {
        register(&app, n).await;
    }
    let ann = auth_for(1);
    let bob = auth_for(2);

    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 2})),
        Some(&ann),
        None,
    )
    .await;
    send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["from ann"]})),
        Some(&ann),
        None,
    )
    .await;
    send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["from bob"]})),
        Some(&bob),
        None,
    )
    .await;
    // a second chat, to check cross-chat addressing
    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 3})),
        Some(&ann),
        None,
    )
    .await;
    send(
        &app,
        "POST",
        "/chats/2/messages",
        Some(json!({"texts": ["elsewhere"]})),
        Some(&ann),
        None,
    )
    .await;

    // empty texts never land
    let response = send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["ok", ""]})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let response = send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": []})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(&app, "GET", "/chats/1/messages/2", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["text"], "from bob");

    // message 3 lives in chat 2, not chat 1
    let response = send(&app, "GET", "/chats/1/messages/3", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(&app, "GET", "/chats/1/messages/9", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // only the sender may edit or delete
    let response = send(
        &app,
        "PUT",
        "/chats/1/messages/2",
        Some(json!({"text": "hijacked"})),
        Some(&ann),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(
        &app,
        "PUT",
        "/chats/1/messages/2",
        Some(json!({"text": "edited by bob"})),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["text"], "edited by bob");

    let response = send(&app, "DELETE", "/chats/1/messages/1", None, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let response = send(&app, "DELETE", "/chats/1/messages/1", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&app, "GET", "/chats/1/messages", None, Some(&ann), None).await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["text"], "edited by bob");
}

#[tokio::test]
async fn message_listing_filters() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;
    register(&app, 2).await;
    let ann = auth_for(1);

    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 2})),
        Some(&ann),
        None,
    )
    .await;
    send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["alpha", "beta", "alphabet", "gamma"]})),
        Some(&ann),
        None,
    )
    .await;

    let response = send(
        &app,
        "GET",
        "/chats/1/messages?text-like=alpha",
        None,
        Some(&ann),
        None,
    )
    .await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);

    let response = send(
        &app,
        "GET",
        "/chats/1/messages?ordered-by-desc=message_id&limit=2",
        None,
        Some(&ann),
        None,
    )
    .await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["text"], "gamma");
    assert_eq!(data[1]["text"], "alphabet");

    let response = send(
        &app,
        "GET",
        "/chats/1/messages?text=beta",
        None,
        Some(&ann),
        None,
    )
    .await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["message_id"], 2);
}

#[tokio::test]
async fn chats_overview_is_message_driven() {
    let (app, _) = spawn_app().await;
    for n in 1..=3 {
        register(&app, n).await;
    }
    let ann = auth_for(1);

    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 2})),
        Some(&ann),
        None,
    )
    .await;
    send(
        &app,
        "POST",
        "/chats",
        Some(json!({"companion_id": 3})),
        Some(&ann),
        None,
    )
    .await;

    // chat with 3 never got a message, so only the chat with 2 shows up
    send(
        &app,
        "POST",
        "/chats/1/messages",
        Some(json!({"texts": ["latest word"]})),
        Some(&ann),
        None,
    )
    .await;

    let response = send(&app, "GET", "/chats/overview", None, Some(&ann), None).await;
    assert_eq!(response.status, StatusCode::OK);
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["username"], "username2");
    assert_eq!(data[0]["text"], "latest word");
}

#[tokio::test]
async fn session_login_and_chat_begin() {
    let (app, _) = spawn_app().await;
    register(&app, 1).await;
    register(&app, 2).await;

    let response = send(
        &app,
        "POST",
        "/login",
        Some(json!({"email": "user1@example.com", "password": "wrong"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        "POST",
        "/login",
        Some(json!({"email": "user1@example.com", "password": "12345678"})),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user_id"], 1);
    let cookie = response.cookie.expect("login sets a session cookie");

    // without a session the begin route demands a login
    let response = send(&app, "GET", "/chats/begin/username2", None, None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        "GET",
        "/chats/begin/username2",
        None,
        None,
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["room_name"], "username1_username2");
    assert_eq!(response.body["companion_id"], 2);

    let response = send(
        &app,
        "GET",
        "/chats/begin/username1",
        None,
        None,
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(&app, "GET", "/chats/begin/ghost", None, None, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, "GET", "/chats/end", None, None, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
}
