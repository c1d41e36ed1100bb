use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use plaza_core::net::messages::{ClientMessage, JoinMsg, JoinRefusedMsg, RoomJoinedMsg, ServerMessage};
use plaza_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use plaza_server::config::{RoomDef, ServerConfig};
use plaza_server::state::AppState;
use plaza_server::{build_app, router};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with the default test room and no credential
    /// verification.
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let (app, _state) = build_app(config);
        Self::serve(app).await
    }

    /// Start a test server over externally-assembled state (custom
    /// collaborators).
    pub async fn from_state(state: AppState) -> Self {
        Self::serve(router(state)).await
    }

    async fn serve(app: axum::Router<()>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// A 10x10 room named "office" with one obstacle at (2, 2).
pub fn test_config() -> ServerConfig {
    ServerConfig {
        rooms: vec![RoomDef {
            id: "office".to_string(),
            width: 10,
            height: 10,
            obstacles: vec![(2, 2)],
        }],
        ..ServerConfig::default()
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage over a WS stream.
pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send a Join and expect success. Returns the RoomJoined reply.
pub async fn ws_join(stream: &mut WsStream, room_id: &str, credential: &str) -> RoomJoinedMsg {
    ws_send(
        stream,
        &ClientMessage::Join(JoinMsg {
            room_id: room_id.to_string(),
            credential: credential.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_server_msg(stream).await {
        ServerMessage::RoomJoined(joined) => *joined,
        other => panic!("Expected RoomJoined, got: {other:?}"),
    }
}

/// Send a Join and expect a refusal.
pub async fn ws_join_expect_refusal(
    stream: &mut WsStream,
    room_id: &str,
    credential: &str,
) -> JoinRefusedMsg {
    ws_send(
        stream,
        &ClientMessage::Join(JoinMsg {
            room_id: room_id.to_string(),
            credential: credential.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_server_msg(stream).await {
        ServerMessage::JoinRefused(refused) => refused,
        other => panic!("Expected JoinRefused, got: {other:?}"),
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Whether the server closed the connection (close frame or stream end)
/// within the timeout.
pub async fn ws_expect_closed(stream: &mut WsStream) -> bool {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Err(_)) => return true,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(false)
}
