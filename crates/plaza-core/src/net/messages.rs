use serde::{Deserialize, Serialize};

use crate::chat::ChatRecord;
use crate::grid::{Direction, Position};
use crate::participant::{OccupantInfo, UserId};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Move = 0x02,
    Teleport = 0x03,
    ChatSend = 0x04,

    // Server -> Client
    RoomJoined = 0x10,
    JoinRefused = 0x11,
    UserJoined = 0x12,
    UserMoved = 0x13,
    MovementRejected = 0x14,
    ChatMessage = 0x15,
    ChatRejected = 0x16,
    UserLeft = 0x17,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Move),
            0x03 => Some(Self::Teleport),
            0x04 => Some(Self::ChatSend),
            0x10 => Some(Self::RoomJoined),
            0x11 => Some(Self::JoinRefused),
            0x12 => Some(Self::UserJoined),
            0x13 => Some(Self::UserMoved),
            0x14 => Some(Self::MovementRejected),
            0x15 => Some(Self::ChatMessage),
            0x16 => Some(Self::ChatRejected),
            0x17 => Some(Self::UserLeft),
            _ => None,
        }
    }
}

/// First message on a fresh connection: authenticate and attach to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub room_id: String,
    pub credential: String,
    pub protocol_version: u8,
}

/// Claimed single-step move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMsg {
    pub x: u32,
    pub y: u32,
    pub direction: Option<Direction>,
}

/// Travel that skips the displacement check (double-click-to-travel).
/// Bounds and obstacles are still validated server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportMsg {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSendMsg {
    pub text: String,
    pub display_name: String,
}

/// Successful join reply to the joining session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomJoinedMsg {
    pub user_id: UserId,
    pub spawn: Position,
    pub username: String,
    pub avatar: Option<String>,
    /// Everyone already in the room, excluding the joiner.
    pub occupants: Vec<OccupantInfo>,
    pub room: RoomMetaMsg,
    /// Most recent messages from the durable chat store, oldest first.
    pub recent_chat: Vec<ChatRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMetaMsg {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRefusedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMovedMsg {
    pub user_id: UserId,
    pub x: u32,
    pub y: u32,
    pub direction: Option<Direction>,
}

/// Sent to the originator only; carries the authoritative position so the
/// client can snap back to truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRejectedMsg {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRejectedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLeftMsg {
    pub user_id: UserId,
}

/// Messages a client may send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(JoinMsg),
    Move(MoveMsg),
    Teleport(TeleportMsg),
    ChatSend(ChatSendMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::Move(_) => MessageType::Move,
            Self::Teleport(_) => MessageType::Teleport,
            Self::ChatSend(_) => MessageType::ChatSend,
        }
    }
}

/// Messages the server may send to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    RoomJoined(Box<RoomJoinedMsg>),
    JoinRefused(JoinRefusedMsg),
    UserJoined(OccupantInfo),
    UserMoved(UserMovedMsg),
    MovementRejected(MovementRejectedMsg),
    ChatMessage(ChatRecord),
    ChatRejected(ChatRejectedMsg),
    UserLeft(UserLeftMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomJoined(_) => MessageType::RoomJoined,
            Self::JoinRefused(_) => MessageType::JoinRefused,
            Self::UserJoined(_) => MessageType::UserJoined,
            Self::UserMoved(_) => MessageType::UserMoved,
            Self::MovementRejected(_) => MessageType::MovementRejected,
            Self::ChatMessage(_) => MessageType::ChatMessage,
            Self::ChatRejected(_) => MessageType::ChatRejected,
            Self::UserLeft(_) => MessageType::UserLeft,
        }
    }
}
