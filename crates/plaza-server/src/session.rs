use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use uuid::Uuid;

use plaza_core::grid::{Position, RoomGeometry};
use plaza_core::net::messages::{
    ClientMessage, JoinMsg, JoinRefusedMsg, MessageType, RoomJoinedMsg, RoomMetaMsg, ServerMessage,
    UserLeftMsg,
};
use plaza_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
    encode_server_message,
};
use plaza_core::participant::UserId;

use crate::registry::Occupant;
use crate::state::{AppState, ConnectionGuard};
use crate::{chat, movement};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

/// Session lifecycle: Connected -> Joined -> Closed. The first frame must
/// be a `Join`; anything else closes the connection. Once joined, the read
/// loop runs until the transport closes, and eviction plus the departure
/// broadcast happen before the session is discarded.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };

    let Ok(ClientMessage::Join(join)) = decode_client_message(&first_msg) else {
        return;
    };

    if join.protocol_version != PROTOCOL_VERSION {
        send_join_refused(
            &mut ws_sender,
            &format!(
                "Protocol version mismatch: client={}, server={PROTOCOL_VERSION}",
                join.protocol_version
            ),
        )
        .await;
        return;
    }

    let joined = match attempt_join(&join, &state).await {
        Ok(j) => j,
        Err(reason) => {
            send_join_refused(&mut ws_sender, &reason).await;
            return;
        },
    };
    let JoinedSession {
        conn_id,
        user_id,
        username,
        room_id,
        rx,
        reply,
    } = joined;

    let announce = ServerMessage::UserJoined(plaza_core::participant::OccupantInfo {
        user_id: reply.user_id.clone(),
        x: reply.spawn.x,
        y: reply.spawn.y,
        username: reply.username.clone(),
        avatar: reply.avatar.clone(),
    });
    let Ok(reply_data) = encode_server_message(&ServerMessage::RoomJoined(reply)) else {
        tracing::warn!("Failed to encode RoomJoined");
        evict(&state, &room_id, &user_id, conn_id).await;
        return;
    };

    if ws_sender
        .send(Message::Binary(reply_data.into()))
        .await
        .is_err()
    {
        evict(&state, &room_id, &user_id, conn_id).await;
        return;
    }

    // Announce to everyone already in the room.
    if let Ok(data) = encode_server_message(&announce) {
        let rooms = state.rooms.read().await;
        rooms.broadcast_except(&room_id, &user_id, &data);
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, &room_id, &user_id, &username).await;

    // Transport closed (cleanly or not) — evict and announce the departure.
    evict(&state, &room_id, &user_id, conn_id).await;

    tracing::info!(%user_id, %room_id, "Session disconnected");
}

struct JoinedSession {
    conn_id: Uuid,
    user_id: UserId,
    username: String,
    room_id: String,
    rx: mpsc::Receiver<Bytes>,
    reply: Box<RoomJoinedMsg>,
}

async fn attempt_join(join: &JoinMsg, state: &AppState) -> Result<JoinedSession, String> {
    let Some(user_id) = state.identity.verify(&join.credential) else {
        tracing::info!(room_id = %join.room_id, "Join refused: invalid credential");
        return Err("Invalid credential".to_string());
    };

    let Some(profile) = state.profiles.profile(&user_id) else {
        tracing::info!(%user_id, "Join refused: unknown profile");
        return Err("Unknown user profile".to_string());
    };

    // Geometry lookup happens before any membership side effect, so an
    // unknown room leaves no partial state behind.
    let Some(geometry) = state.spaces.room(&join.room_id) else {
        tracing::info!(%user_id, room_id = %join.room_id, "Join refused: unknown room");
        return Err(format!("Unknown room: {}", join.room_id));
    };

    let recent_chat = state
        .chat_store
        .load_recent(&join.room_id, state.config.limits.recent_chat_limit)
        .await;

    let spawn = pick_spawn(&geometry).ok_or_else(|| "Room has no walkable cells".to_string())?;

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.session_message_buffer);
    let conn_id = Uuid::new_v4();
    let occupant = Occupant {
        conn_id,
        user_id: user_id.clone(),
        username: profile.username.clone(),
        avatar: profile.avatar.clone(),
        position: spawn,
        sender: tx,
    };

    let occupants = {
        let mut rooms = state.rooms.write().await;
        rooms
            .join(&join.room_id, geometry.clone(), occupant)
            .map_err(|e| e.to_string())?
    };

    tracing::info!(
        %user_id,
        room_id = %join.room_id,
        spawn_x = spawn.x,
        spawn_y = spawn.y,
        "Session joined"
    );

    Ok(JoinedSession {
        conn_id,
        user_id: user_id.clone(),
        username: profile.username.clone(),
        room_id: join.room_id.clone(),
        rx,
        reply: Box::new(RoomJoinedMsg {
            user_id,
            spawn,
            username: profile.username,
            avatar: profile.avatar,
            occupants,
            room: RoomMetaMsg {
                id: join.room_id.clone(),
                width: geometry.width,
                height: geometry.height,
            },
            recent_chat,
        }),
    })
}

/// Pick a spawn uniformly at random among walkable cells. Rejection-samples
/// first, then falls back to a scan for dense obstacle maps.
fn pick_spawn(geometry: &RoomGeometry) -> Option<Position> {
    if geometry.width == 0 || geometry.height == 0 {
        return None;
    }
    let mut rng = rand::rng();
    for _ in 0..64 {
        let pos = Position::new(
            rng.random_range(0..geometry.width),
            rng.random_range(0..geometry.height),
        );
        if geometry.is_walkable(pos) {
            return Some(pos);
        }
    }
    (0..geometry.height)
        .flat_map(|y| (0..geometry.width).map(move |x| Position::new(x, y)))
        .find(|&p| geometry.is_walkable(p))
}

/// Remove the session from its room and announce the departure to the
/// remaining occupants. One write-lock critical section, so no further
/// broadcast can target the departed session.
async fn evict(state: &AppState, room_id: &str, user_id: &str, conn_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    if rooms.leave(room_id, user_id, conn_id).is_some() {
        let event = ServerMessage::UserLeft(UserLeftMsg {
            user_id: user_id.to_string(),
        });
        if let Ok(data) = encode_server_message(&event) {
            rooms.broadcast(room_id, &data);
        }
    }
}

async fn send_join_refused(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    reason: &str,
) {
    let msg = ServerMessage::JoinRefused(JoinRefusedMsg {
        reason: reason.to_string(),
    });
    if let Ok(data) = encode_server_message(&msg)
        && let Err(e) = ws_sender.send(Message::Binary(data.into())).await
    {
        tracing::warn!(error = %e, "Failed to send join refusal");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    room_id: &str,
    user_id: &str,
    username: &str,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(user_id, room_id, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let Ok(msg_type) = decode_message_type(&data) else {
            continue;
        };

        // Server-authoritative: reject server-origin event types from clients.
        if matches!(
            msg_type,
            MessageType::RoomJoined
                | MessageType::JoinRefused
                | MessageType::UserJoined
                | MessageType::UserMoved
                | MessageType::MovementRejected
                | MessageType::ChatMessage
                | MessageType::ChatRejected
                | MessageType::UserLeft
        ) {
            tracing::warn!(
                user_id,
                room_id,
                ?msg_type,
                "Rejected server-only message from client"
            );
            continue;
        }

        let Ok(client_msg) = decode_client_message(&data) else {
            continue;
        };

        match client_msg {
            // A session holds exactly one room membership for its lifetime.
            ClientMessage::Join(_) => {
                tracing::warn!(user_id, room_id, "Ignoring Join on an already-joined session");
            },
            ClientMessage::Move(m) => {
                movement::handle_move(state, room_id, user_id, m).await;
            },
            ClientMessage::Teleport(m) => {
                movement::handle_teleport(state, room_id, user_id, m).await;
            },
            ClientMessage::ChatSend(m) => {
                chat::handle_chat(state, room_id, user_id, username, m).await;
            },
        }
    }
}
