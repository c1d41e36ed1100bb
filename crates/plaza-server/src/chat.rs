use plaza_core::chat::ChatDraft;
use plaza_core::net::messages::{ChatRejectedMsg, ChatSendMsg, ServerMessage};
use plaza_core::net::protocol::encode_server_message;

use crate::state::AppState;

/// Handle a chat utterance from a joined session: validate, persist via the
/// durable store, then broadcast the stored record to the whole room
/// including the sender, so every client sees the store-assigned id and
/// ordering.
pub async fn handle_chat(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    username: &str,
    msg: ChatSendMsg,
) {
    let max_len = state.config.limits.max_chat_len;

    if let Err(reason) = validate_text(&msg.text, max_len) {
        tracing::debug!(user_id, room_id, reason, "Rejected chat message");
        send_rejection(state, room_id, user_id, reason).await;
        return;
    }

    let display_name = match msg.display_name.trim() {
        "" => username.to_string(),
        trimmed => trimmed.to_string(),
    };

    let draft = ChatDraft {
        user_id: user_id.to_string(),
        display_name,
        text: msg.text,
    };

    // The store round-trip happens without the registry lock held.
    let record = match state.chat_store.append(room_id, draft).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(user_id, room_id, error = %e, "Failed to persist chat message");
            send_rejection(state, room_id, user_id, "message could not be stored").await;
            return;
        },
    };

    if let Ok(data) = encode_server_message(&ServerMessage::ChatMessage(record)) {
        let rooms = state.rooms.read().await;
        rooms.broadcast(room_id, &data);
    }
}

fn validate_text(text: &str, max_len: usize) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err("empty message");
    }
    if text.chars().count() > max_len {
        return Err("message too long");
    }
    if text.chars().any(|c| c.is_control() && c != '\n') {
        return Err("control characters not allowed");
    }
    Ok(())
}

async fn send_rejection(state: &AppState, room_id: &str, user_id: &str, reason: &str) {
    let event = ServerMessage::ChatRejected(ChatRejectedMsg {
        reason: reason.to_string(),
    });
    if let Ok(data) = encode_server_message(&event) {
        let rooms = state.rooms.read().await;
        rooms.send_to(room_id, user_id, &data);
    }
}
