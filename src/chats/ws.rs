use std::sync::Arc;

use axum::Json;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use chrono::DateTime;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_sessions::Session;

use crate::auth::user::User;
use crate::chats::identity::ChatDirectory;
use crate::chats::rooms::RoomHub;
use crate::chats::store::{self, NewMessage};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::session;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientEvent {
    EnterRoom,
    PutData {
        message: String,
        timestamp_milliseconds: f64,
    },
    LeaveRoom,
    GetMoreMessages {
        messages_offset: i64,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ServerEvent {
    Status {
        message: String,
    },
    PrintMessage {
        message: String,
        timestamp_milliseconds: f64,
    },
    LoadMoreMessages {
        messages_number: usize,
        messages: Vec<BackfillEntry>,
    },
}

#[derive(Debug, Serialize)]
struct BackfillEntry {
    is_current_user: bool,
    message_text: String,
    timestamp_milliseconds: i64,
}

fn event_json(event: &ServerEvent) -> String {
    // plain data, serialization cannot fail
    serde_json::to_string(event).expect("server event is serializable")
}

/// Stores everything the socket needs into the session and hands the room
/// name back, so the subsequent websocket upgrade can run without paths or
/// query strings.
#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn begin(
    Path(companion_username): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(rooms): State<RoomHub>,
    session: Session,
) -> ApiResult<Json<Value>> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Err(ApiError::Unauthorized("You have to log in first".to_owned()));
    };
    let Some(companion) = User::find_by_username(&db_pool, &companion_username).await? else {
        return Err(ApiError::NotFound(format!(
            "User '{companion_username}' does not exist"
        )));
    };
    let room_name = rooms.room_name(&user.username, &companion.username)?;
    session.insert(session::ROOM_NAME, &room_name).await?;
    session.insert(session::USER_NAME, &user.name).await?;
    session.insert(session::COMPANION_ID, companion.user_id).await?;
    Ok(Json(json!({
        "room_name": room_name,
        "companion_id": companion.user_id,
    })))
}

/// Clears the realtime state when the user leaves the chat page.
pub(crate) async fn end(session: Session) -> ApiResult<Json<Value>> {
    session.remove::<String>(session::ROOM_NAME).await?;
    session.remove::<String>(session::USER_NAME).await?;
    session.remove::<i64>(session::COMPANION_ID).await?;
    Ok(Json(json!({"message": "Left the chat"})))
}

struct RoomContext {
    room_name: String,
    user_name: String,
    user_id: i64,
    companion_id: i64,
    page_size: i64,
}

#[axum::debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(chats): State<ChatDirectory>,
    State(rooms): State<RoomHub>,
    State(config): State<Arc<Config>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Err(ApiError::Unauthorized("You have to log in first".to_owned()));
    };
    let (Some(room_name), Some(user_name), Some(companion_id)) = (
        session.get::<String>(session::ROOM_NAME).await?,
        session.get::<String>(session::USER_NAME).await?,
        session.get::<i64>(session::COMPANION_ID).await?,
    ) else {
        return Err(ApiError::NotFound(
            "No chat has been begun in this session".to_owned(),
        ));
    };
    let ctx = RoomContext {
        room_name,
        user_name,
        user_id: user.user_id,
        companion_id,
        page_size: config.messages_per_load_event,
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, db_pool, chats, rooms, ctx)))
}

/// One connection's event loop: `connected` ack, then room membership driven
/// by the client events. Message echo is broadcast before the row is written;
/// persistence failures are logged, never sent back, and never gate delivery.
async fn handle_socket(
    socket: WebSocket,
    db_pool: SqlitePool,
    chats: ChatDirectory,
    rooms: RoomHub,
    ctx: RoomContext,
) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let send_task = tokio::spawn(async move {
        while let Some(payload) = out_rx.recv().await {
            if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(event_json(&ServerEvent::Status {
        message: "connected".to_owned(),
    }));

    // forwards the room broadcast into this connection while joined
    let mut membership: Option<JoinHandle<()>> = None;

    while let Some(Ok(frame)) = stream.next().await {
        let WsMessage::Text(text) = frame else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<ClientEvent>(&text) else {
            continue;
        };
        match event {
            ClientEvent::EnterRoom => {
                if membership.is_none() {
                    let mut room_rx = rooms.join(&ctx.room_name);
                    let forward = out_tx.clone();
                    membership = Some(tokio::spawn(async move {
                        while let Ok(payload) = room_rx.recv().await {
                            if forward.send(payload).is_err() {
                                break;
                            }
                        }
                    }));
                }
                rooms.broadcast(
                    &ctx.room_name,
                    event_json(&ServerEvent::Status {
                        message: format!("{} entered the room", ctx.user_name),
                    }),
                );
            }
            ClientEvent::PutData {
                message,
                timestamp_milliseconds,
            } => {
                rooms.broadcast(
                    &ctx.room_name,
                    event_json(&ServerEvent::PrintMessage {
                        message: message.clone(),
                        timestamp_milliseconds,
                    }),
                );
                let written = DateTime::from_timestamp((timestamp_milliseconds / 1000.0) as i64, 0)
                    .map(|dt| dt.naive_utc());
                let stored = store::create_message(
                    &db_pool,
                    &chats,
                    NewMessage {
                        text: &message,
                        sender_id: ctx.user_id,
                        receiver_id: ctx.companion_id,
                        chat_id: None,
                        datetime_writing: written,
                    },
                )
                .await;
                if let Err(err) = stored {
                    tracing::warn!(error = %err, room = %ctx.room_name, "failed to persist message");
                }
            }
            ClientEvent::LeaveRoom => {
                if let Some(forward) = membership.take() {
                    forward.abort();
                }
                rooms.broadcast(
                    &ctx.room_name,
                    event_json(&ServerEvent::Status {
                        message: format!("{} left the room", ctx.user_name),
                    }),
                );
                rooms.prune(&ctx.room_name);
            }
            ClientEvent::GetMoreMessages { messages_offset } => {
                let window = store::last_messages_between(
                    &db_pool,
                    ctx.user_id,
                    ctx.companion_id,
                    messages_offset,
                    ctx.page_size,
                )
                .await;
                match window {
                    Ok(window) => {
                        let messages: Vec<BackfillEntry> = window
                            .into_iter()
                            .map(|message| BackfillEntry {
                                is_current_user: message.sender_id == ctx.user_id,
                                message_text: message.text,
                                timestamp_milliseconds: message
                                    .datetime_writing
                                    .and_utc()
                                    .timestamp_millis(),
                            })
                            .collect();
                        let _ = out_tx.send(event_json(&ServerEvent::LoadMoreMessages {
                            messages_number: messages.len(),
                            messages,
                        }));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, room = %ctx.room_name, "failed to load message history");
                    }
                }
            }
        }
    }

    // implicit departure: membership is dropped without any broadcast
    if let Some(forward) = membership.take() {
        forward.abort();
    }
    rooms.prune(&ctx.room_name);
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse() {
        let event: ClientEvent = serde_json::from_str(r#"{"event": "enter_room"}"#).unwrap();
        assert!(matches!(event, ClientEvent::EnterRoom));

        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "put_data", "data": {"message": "hi", "timestamp_milliseconds": 1700000000123.0}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::PutData {
                message,
                timestamp_milliseconds,
            } => {
                assert_eq!(message, "hi");
                assert_eq!(timestamp_milliseconds, 1_700_000_000_123.0);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "get_more_messages", "data": {"messages_offset": 20}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::GetMoreMessages {
                messages_offset: 20
            }
        ));
    }

    #[test]
    fn server_events_serialize_with_event_tag() {
        let payload = event_json(&ServerEvent::Status {
            message: "connected".to_owned(),
        });
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "status");
        assert_eq!(value["data"]["message"], "connected");

        let payload = event_json(&ServerEvent::LoadMoreMessages {
            messages_number: 1,
            messages: vec![BackfillEntry {
                is_current_user: true,
                message_text: "hi".to_owned(),
                timestamp_milliseconds: 1_700_000_000_000,
            }],
        });
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "load_more_messages");
        assert_eq!(value["data"]["messages_number"], 1);
        assert_eq!(value["data"]["messages"][0]["is_current_user"], true);
    }
}
