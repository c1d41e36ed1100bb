use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use plaza_core::grid::{Position, RoomGeometry};
use plaza_core::participant::{OccupantInfo, UserId};

/// Per-session sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients. Uses `Bytes`
/// for zero-copy cloning when broadcasting to multiple sessions.
pub type SessionSender = mpsc::Sender<Bytes>;

/// One joined session as the registry tracks it.
pub struct Occupant {
    pub conn_id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub avatar: Option<String>,
    pub position: Position,
    pub sender: SessionSender,
}

impl Occupant {
    pub fn info(&self) -> OccupantInfo {
        OccupantInfo {
            user_id: self.user_id.clone(),
            x: self.position.x,
            y: self.position.y,
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

struct RoomEntry {
    geometry: RoomGeometry,
    occupants: HashMap<UserId, Occupant>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinError {
    /// The identity already holds a joined session in this room.
    IdentityInUse,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityInUse => write!(f, "identity already joined to this room"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Process-wide table of live rooms and their joined sessions. Rooms are
/// created lazily on first join and dropped when the last occupant leaves.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session to a room, creating the room from `geometry` if it
    /// does not exist yet. Occupants are keyed by user identity, so a second
    /// session for the same identity is refused and the original untouched.
    /// Returns the other occupants at the moment of the join.
    pub fn join(
        &mut self,
        room_id: &str,
        geometry: RoomGeometry,
        occupant: Occupant,
    ) -> Result<Vec<OccupantInfo>, JoinError> {
        let entry = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomEntry {
                geometry,
                occupants: HashMap::new(),
            });

        if entry.occupants.contains_key(&occupant.user_id) {
            return Err(JoinError::IdentityInUse);
        }

        let others = entry.occupants.values().map(Occupant::info).collect();
        entry.occupants.insert(occupant.user_id.clone(), occupant);
        Ok(others)
    }

    /// Remove a session from its room. The connection id must match the
    /// tracked occupant, so a stale cleanup can never evict a session it
    /// does not own. Empty rooms are dropped from the table.
    pub fn leave(&mut self, room_id: &str, user_id: &str, conn_id: Uuid) -> Option<Occupant> {
        let entry = self.rooms.get_mut(room_id)?;
        if entry.occupants.get(user_id)?.conn_id != conn_id {
            return None;
        }
        let removed = entry.occupants.remove(user_id);
        if entry.occupants.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    pub fn geometry(&self, room_id: &str) -> Option<&RoomGeometry> {
        self.rooms.get(room_id).map(|e| &e.geometry)
    }

    pub fn position_of(&self, room_id: &str, user_id: &str) -> Option<Position> {
        self.rooms
            .get(room_id)?
            .occupants
            .get(user_id)
            .map(|o| o.position)
    }

    /// Update a session's authoritative position. Returns false if the
    /// session is not in the room.
    pub fn apply_move(&mut self, room_id: &str, user_id: &str, to: Position) -> bool {
        if let Some(entry) = self.rooms.get_mut(room_id)
            && let Some(occupant) = entry.occupants.get_mut(user_id)
        {
            occupant.position = to;
            true
        } else {
            false
        }
    }

    pub fn occupant_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |e| e.occupants.len())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_occupants(&self) -> usize {
        self.rooms.values().map(|e| e.occupants.len()).sum()
    }

    /// Send a raw binary message to one session in a room.
    pub fn send_to(&self, room_id: &str, user_id: &str, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_id)
            && let Some(occupant) = entry.occupants.get(user_id)
            && let Err(e) = occupant.sender.try_send(Bytes::copy_from_slice(data))
        {
            tracing::debug!(
                user_id, room_id, error = %e,
                "Failed to send to session (slow or disconnected)"
            );
        }
    }

    /// Broadcast raw binary data to every session in a room. Sends are
    /// best-effort: a slow or dead peer is skipped, never awaited.
    pub fn broadcast(&self, room_id: &str, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_id) {
            let bytes = Bytes::copy_from_slice(data);
            for (uid, occupant) in &entry.occupants {
                if let Err(e) = occupant.sender.try_send(bytes.clone()) {
                    tracing::debug!(
                        user_id = %uid, room_id, error = %e,
                        "Skipping broadcast to slow session"
                    );
                }
            }
        }
    }

    /// Broadcast raw binary data to every session in a room except one.
    pub fn broadcast_except(&self, room_id: &str, exclude: &str, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_id) {
            let bytes = Bytes::copy_from_slice(data);
            for (uid, occupant) in &entry.occupants {
                if uid != exclude
                    && let Err(e) = occupant.sender.try_send(bytes.clone())
                {
                    tracing::debug!(
                        user_id = %uid, room_id, error = %e,
                        "Skipping broadcast to slow session"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sender() -> (SessionSender, mpsc::Receiver<Bytes>) {
        mpsc::channel(256)
    }

    fn occupant(user: &str, pos: Position, sender: SessionSender) -> Occupant {
        Occupant {
            conn_id: Uuid::new_v4(),
            user_id: user.to_string(),
            username: user.to_string(),
            avatar: None,
            position: pos,
            sender,
        }
    }

    fn ten_by_ten() -> RoomGeometry {
        RoomGeometry::new(10, 10)
    }

    #[test]
    fn join_creates_room_lazily() {
        let mut registry = RoomRegistry::new();
        assert_eq!(registry.room_count(), 0);

        let (tx, _rx) = make_sender();
        let others = registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(1, 1), tx))
            .unwrap();
        assert!(others.is_empty());
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.occupant_count("r1"), 1);
    }

    #[test]
    fn join_returns_existing_occupants() {
        let mut registry = RoomRegistry::new();
        let (tx1, _rx1) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(2, 3), tx1))
            .unwrap();

        let (tx2, _rx2) = make_sender();
        let others = registry
            .join("r1", ten_by_ten(), occupant("u-2", Position::new(5, 5), tx2))
            .unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].user_id, "u-1");
        assert_eq!((others[0].x, others[0].y), (2, 3));
    }

    #[test]
    fn duplicate_identity_refused_and_original_untouched() {
        let mut registry = RoomRegistry::new();
        let (tx1, _rx1) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(2, 3), tx1))
            .unwrap();

        let (tx2, _rx2) = make_sender();
        let err = registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx2))
            .unwrap_err();
        assert_eq!(err, JoinError::IdentityInUse);
        assert_eq!(registry.occupant_count("r1"), 1);
        assert_eq!(registry.position_of("r1", "u-1"), Some(Position::new(2, 3)));
    }

    #[test]
    fn same_identity_may_join_different_rooms() {
        let mut registry = RoomRegistry::new();
        let (tx1, _rx1) = make_sender();
        let (tx2, _rx2) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx1))
            .unwrap();
        registry
            .join("r2", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx2))
            .unwrap();
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn leave_requires_matching_connection() {
        let mut registry = RoomRegistry::new();
        let (tx, _rx) = make_sender();
        let occ = occupant("u-1", Position::new(1, 1), tx);
        let conn_id = occ.conn_id;
        registry.join("r1", ten_by_ten(), occ).unwrap();

        assert!(registry.leave("r1", "u-1", Uuid::new_v4()).is_none());
        assert_eq!(registry.occupant_count("r1"), 1);

        assert!(registry.leave("r1", "u-1", conn_id).is_some());
        assert_eq!(registry.occupant_count("r1"), 0);
    }

    #[test]
    fn empty_room_is_dropped() {
        let mut registry = RoomRegistry::new();
        let (tx, _rx) = make_sender();
        let occ = occupant("u-1", Position::new(1, 1), tx);
        let conn_id = occ.conn_id;
        registry.join("r1", ten_by_ten(), occ).unwrap();
        assert_eq!(registry.room_count(), 1);

        registry.leave("r1", "u-1", conn_id);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.geometry("r1").is_none());
    }

    #[test]
    fn apply_move_updates_authoritative_position() {
        let mut registry = RoomRegistry::new();
        let (tx, _rx) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(4, 4), tx))
            .unwrap();

        assert!(registry.apply_move("r1", "u-1", Position::new(5, 4)));
        assert_eq!(registry.position_of("r1", "u-1"), Some(Position::new(5, 4)));
        assert!(!registry.apply_move("r1", "u-9", Position::new(5, 4)));
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let mut registry = RoomRegistry::new();
        let (tx1, mut rx1) = make_sender();
        let (tx2, mut rx2) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx1))
            .unwrap();
        registry
            .join("r1", ten_by_ten(), occupant("u-2", Position::new(1, 0), tx2))
            .unwrap();

        registry.broadcast("r1", b"hello");
        assert_eq!(rx1.try_recv().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn broadcast_except_skips_the_originator() {
        let mut registry = RoomRegistry::new();
        let (tx1, mut rx1) = make_sender();
        let (tx2, mut rx2) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx1))
            .unwrap();
        registry
            .join("r1", ten_by_ten(), occupant("u-2", Position::new(1, 0), tx2))
            .unwrap();

        registry.broadcast_except("r1", "u-1", b"moved");
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"moved"));
    }

    #[test]
    fn broadcast_never_blocks_on_full_queue() {
        let mut registry = RoomRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx1))
            .unwrap();
        registry
            .join("r1", ten_by_ten(), occupant("u-2", Position::new(1, 0), tx2))
            .unwrap();

        // u-1's queue holds one message; the second is dropped, not awaited.
        registry.broadcast("r1", b"one");
        registry.broadcast("r1", b"two");

        assert_eq!(rx1.try_recv().unwrap(), Bytes::from_static(b"one"));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"one"));
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"two"));
    }

    #[test]
    fn send_to_targets_one_session() {
        let mut registry = RoomRegistry::new();
        let (tx1, mut rx1) = make_sender();
        let (tx2, mut rx2) = make_sender();
        registry
            .join("r1", ten_by_ten(), occupant("u-1", Position::new(0, 0), tx1))
            .unwrap();
        registry
            .join("r1", ten_by_ten(), occupant("u-2", Position::new(1, 0), tx2))
            .unwrap();

        registry.send_to("r1", "u-2", b"snap");
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"snap"));
    }
}
