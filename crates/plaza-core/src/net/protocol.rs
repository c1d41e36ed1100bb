use serde::{Deserialize, Serialize};

use super::messages::{
    ChatRejectedMsg, ChatSendMsg, ClientMessage, JoinMsg, JoinRefusedMsg, MessageType, MoveMsg,
    MovementRejectedMsg, RoomJoinedMsg, ServerMessage, TeleportMsg, UserLeftMsg, UserMovedMsg,
};
use crate::chat::ChatRecord;
use crate::participant::OccupantInfo;

/// Current protocol version. Checked once at join.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Join(m) => encode_message(MessageType::Join, m),
        ClientMessage::Move(m) => encode_message(MessageType::Move, m),
        ClientMessage::Teleport(m) => encode_message(MessageType::Teleport, m),
        ClientMessage::ChatSend(m) => encode_message(MessageType::ChatSend, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoomJoined(m) => encode_message(MessageType::RoomJoined, m),
        ServerMessage::JoinRefused(m) => encode_message(MessageType::JoinRefused, m),
        ServerMessage::UserJoined(m) => encode_message(MessageType::UserJoined, m),
        ServerMessage::UserMoved(m) => encode_message(MessageType::UserMoved, m),
        ServerMessage::MovementRejected(m) => encode_message(MessageType::MovementRejected, m),
        ServerMessage::ChatMessage(m) => encode_message(MessageType::ChatMessage, m),
        ServerMessage::ChatRejected(m) => encode_message(MessageType::ChatRejected, m),
        ServerMessage::UserLeft(m) => encode_message(MessageType::UserLeft, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Move => Ok(ClientMessage::Move(decode_payload::<MoveMsg>(data)?)),
        MessageType::Teleport => Ok(ClientMessage::Teleport(decode_payload::<TeleportMsg>(
            data,
        )?)),
        MessageType::ChatSend => Ok(ClientMessage::ChatSend(decode_payload::<ChatSendMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoomJoined => Ok(ServerMessage::RoomJoined(Box::new(decode_payload::<
            RoomJoinedMsg,
        >(data)?))),
        MessageType::JoinRefused => Ok(ServerMessage::JoinRefused(
            decode_payload::<JoinRefusedMsg>(data)?,
        )),
        MessageType::UserJoined => Ok(ServerMessage::UserJoined(decode_payload::<OccupantInfo>(
            data,
        )?)),
        MessageType::UserMoved => Ok(ServerMessage::UserMoved(decode_payload::<UserMovedMsg>(
            data,
        )?)),
        MessageType::MovementRejected => Ok(ServerMessage::MovementRejected(decode_payload::<
            MovementRejectedMsg,
        >(data)?)),
        MessageType::ChatMessage => Ok(ServerMessage::ChatMessage(decode_payload::<ChatRecord>(
            data,
        )?)),
        MessageType::ChatRejected => Ok(ServerMessage::ChatRejected(decode_payload::<
            ChatRejectedMsg,
        >(data)?)),
        MessageType::UserLeft => Ok(ServerMessage::UserLeft(decode_payload::<UserLeftMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
