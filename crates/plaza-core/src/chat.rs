use serde::{Deserialize, Serialize};

use crate::participant::UserId;

/// A chat utterance before the durable store has seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatDraft {
    pub user_id: UserId,
    pub display_name: String,
    pub text: String,
}

/// A fully-formed chat message: the store assigns the room-scoped sequence
/// id and creation timestamp, and the result is what gets broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Room-scoped sequence number assigned by the store.
    pub id: u64,
    pub user_id: UserId,
    pub display_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}
