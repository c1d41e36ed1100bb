use serde::{Deserialize, Serialize};

use crate::grid::Position;

/// Resolved user identity, issued by the identity collaborator.
pub type UserId = String;

/// Display profile resolved at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub avatar: Option<String>,
}

/// A room occupant as seen by other members: identity, profile, and the
/// cell they currently stand on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupantInfo {
    pub user_id: UserId,
    pub x: u32,
    pub y: u32,
    pub username: String,
    pub avatar: Option<String>,
}

impl OccupantInfo {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}
