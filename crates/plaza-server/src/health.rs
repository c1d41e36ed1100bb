use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;

/// Liveness and coarse occupancy counters.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.rooms.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "rooms": rooms.room_count(),
        "occupants": rooms.total_occupants(),
        "connections": state.ws_connection_count.load(Ordering::Relaxed),
    }))
}
