use std::collections::{HashMap, VecDeque};

use plaza_core::chat::ChatRecord;
use plaza_core::grid::{Direction, Position};
use plaza_core::net::messages::ServerMessage;
use plaza_core::participant::UserId;

use crate::interp::{InterpolatorConfig, MotionTracker, Tick};

/// One remote participant as the renderer wants it: identity, profile, and
/// a smoothed position for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePeer {
    pub user_id: UserId,
    pub username: String,
    pub avatar: Option<String>,
    pub x: f32,
    pub y: f32,
    pub moving: bool,
    pub facing: Option<Direction>,
}

struct PeerMeta {
    username: String,
    avatar: Option<String>,
    facing: Option<Direction>,
}

/// Applies fanned-out room events to a per-peer tracking table and exposes
/// a per-frame sampling view. Pure state: no sockets, no rendering.
pub struct RemoteRoster {
    tracker: MotionTracker,
    meta: HashMap<UserId, PeerMeta>,
    transcript: VecDeque<ChatRecord>,
    transcript_cap: usize,
}

impl Default for RemoteRoster {
    fn default() -> Self {
        Self::new(InterpolatorConfig::default(), 200)
    }
}

impl RemoteRoster {
    pub fn new(config: InterpolatorConfig, transcript_cap: usize) -> Self {
        Self {
            tracker: MotionTracker::new(config),
            meta: HashMap::new(),
            transcript: VecDeque::new(),
            transcript_cap,
        }
    }

    /// Apply one server event at the given client tick.
    pub fn apply(&mut self, msg: &ServerMessage, now: Tick) {
        match msg {
            ServerMessage::RoomJoined(joined) => {
                for occupant in &joined.occupants {
                    self.meta.insert(
                        occupant.user_id.clone(),
                        PeerMeta {
                            username: occupant.username.clone(),
                            avatar: occupant.avatar.clone(),
                            facing: None,
                        },
                    );
                    self.tracker
                        .report(&occupant.user_id, occupant.position(), false, now);
                }
                for record in &joined.recent_chat {
                    self.push_chat(record.clone());
                }
            },
            ServerMessage::UserJoined(info) => {
                self.meta.insert(
                    info.user_id.clone(),
                    PeerMeta {
                        username: info.username.clone(),
                        avatar: info.avatar.clone(),
                        facing: None,
                    },
                );
                self.tracker
                    .report(&info.user_id, info.position(), false, now);
            },
            ServerMessage::UserMoved(moved) => {
                // A report for an unknown peer creates it; profile details
                // stay placeholder until a proper join event shows up.
                let meta = self
                    .meta
                    .entry(moved.user_id.clone())
                    .or_insert_with(|| PeerMeta {
                        username: moved.user_id.clone(),
                        avatar: None,
                        facing: None,
                    });
                meta.facing = moved.direction;
                self.tracker.report(
                    &moved.user_id,
                    Position::new(moved.x, moved.y),
                    moved.direction.is_some(),
                    now,
                );
            },
            ServerMessage::UserLeft(left) => {
                self.meta.remove(&left.user_id);
                self.tracker.forget(&left.user_id);
            },
            ServerMessage::ChatMessage(record) => {
                self.push_chat(record.clone());
            },
            // Addressed to the local player, not the roster.
            ServerMessage::JoinRefused(_)
            | ServerMessage::MovementRejected(_)
            | ServerMessage::ChatRejected(_) => {},
        }
    }

    /// Smoothed view of every remote peer at `now`, sorted by user id for
    /// deterministic iteration.
    pub fn sample(&mut self, now: Tick) -> Vec<RemotePeer> {
        let mut out: Vec<RemotePeer> = self
            .tracker
            .sample(now)
            .into_iter()
            .filter_map(|(user_id, sample)| {
                let meta = self.meta.get(&user_id)?;
                Some(RemotePeer {
                    username: meta.username.clone(),
                    avatar: meta.avatar.clone(),
                    facing: meta.facing,
                    user_id,
                    x: sample.x,
                    y: sample.y,
                    moving: sample.moving,
                })
            })
            .collect();
        out.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        out
    }

    pub fn peer_count(&self) -> usize {
        self.meta.len()
    }

    /// Chat messages seen so far, oldest first.
    pub fn transcript(&self) -> impl Iterator<Item = &ChatRecord> {
        self.transcript.iter()
    }

    fn push_chat(&mut self, record: ChatRecord) {
        self.transcript.push_back(record);
        while self.transcript.len() > self.transcript_cap {
            self.transcript.pop_front();
        }
    }
}
