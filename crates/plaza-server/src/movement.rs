use plaza_core::grid::{Position, is_legal_step};
use plaza_core::net::messages::{
    MoveMsg, MovementRejectedMsg, ServerMessage, TeleportMsg, UserMovedMsg,
};
use plaza_core::net::protocol::encode_server_message;

use crate::state::AppState;

/// Handle a claimed single-step move. On acceptance the authoritative
/// position is updated and `UserMoved` is fanned out to everyone but the
/// originator; on rejection only the originator gets `MovementRejected`
/// with its unchanged authoritative position.
pub async fn handle_move(state: &AppState, room_id: &str, user_id: &str, msg: MoveMsg) {
    let target = Position::new(msg.x, msg.y);
    let mut rooms = state.rooms.write().await;

    let Some(current) = rooms.position_of(room_id, user_id) else {
        return;
    };
    let in_bounds = rooms.geometry(room_id).is_some_and(|g| g.contains(target));

    if is_legal_step(current, target) && in_bounds {
        rooms.apply_move(room_id, user_id, target);
        let event = ServerMessage::UserMoved(UserMovedMsg {
            user_id: user_id.to_string(),
            x: target.x,
            y: target.y,
            direction: msg.direction,
        });
        if let Ok(data) = encode_server_message(&event) {
            rooms.broadcast_except(room_id, user_id, &data);
        }
    } else {
        tracing::debug!(
            user_id,
            room_id,
            from = ?current,
            to = ?target,
            "Rejected movement"
        );
        send_rejection(&rooms, room_id, user_id, current);
    }
}

/// Teleport-style travel (double-click-to-travel): skips the displacement
/// check but still validates bounds and obstacle-free placement.
pub async fn handle_teleport(state: &AppState, room_id: &str, user_id: &str, msg: TeleportMsg) {
    let target = Position::new(msg.x, msg.y);
    let mut rooms = state.rooms.write().await;

    let Some(current) = rooms.position_of(room_id, user_id) else {
        return;
    };
    let walkable = rooms
        .geometry(room_id)
        .is_some_and(|g| g.is_walkable(target));

    if walkable {
        rooms.apply_move(room_id, user_id, target);
        let event = ServerMessage::UserMoved(UserMovedMsg {
            user_id: user_id.to_string(),
            x: target.x,
            y: target.y,
            direction: None,
        });
        if let Ok(data) = encode_server_message(&event) {
            rooms.broadcast_except(room_id, user_id, &data);
        }
    } else {
        tracing::debug!(user_id, room_id, to = ?target, "Rejected teleport");
        send_rejection(&rooms, room_id, user_id, current);
    }
}

fn send_rejection(
    rooms: &crate::registry::RoomRegistry,
    room_id: &str,
    user_id: &str,
    authoritative: Position,
) {
    let event = ServerMessage::MovementRejected(MovementRejectedMsg {
        x: authoritative.x,
        y: authoritative.y,
    });
    if let Ok(data) = encode_server_message(&event) {
        rooms.send_to(room_id, user_id, &data);
    }
}
