use serde::Deserialize;

use plaza_core::grid::{Position, RoomGeometry};

/// Top-level server configuration, loaded from `plaza.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    /// Rooms served by the built-in space geometry directory.
    pub rooms: Vec<RoomDef>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            rooms: vec![RoomDef {
                id: "lobby".to_string(),
                width: 32,
                height: 32,
                obstacles: Vec::new(),
            }],
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for credential verification. None = verification
    /// disabled: the credential is taken as the user id (dev mode).
    pub token_secret: Option<String>,
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub session_message_buffer: usize,
    /// Maximum chat text length in characters.
    pub max_chat_len: usize,
    /// How many stored messages a joining session receives.
    pub recent_chat_limit: usize,
    /// Per-room cap on messages retained by the in-memory chat store.
    pub chat_history_cap: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 50.0,
            session_message_buffer: 256,
            max_chat_len: 2000,
            recent_chat_limit: 50,
            chat_history_cap: 500,
        }
    }
}

/// One room definition: id, grid bounds, and static obstacle cells.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomDef {
    pub id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub obstacles: Vec<(u32, u32)>,
}

impl RoomDef {
    pub fn geometry(&self) -> RoomGeometry {
        let mut geo = RoomGeometry::new(self.width, self.height);
        geo.obstacles = self
            .obstacles
            .iter()
            .map(|&(x, y)| Position::new(x, y))
            .collect();
        geo
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is absent or malformed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path, error = %e, "Failed to parse config, using defaults");
                    Self::default()
                },
            },
            Err(_) => {
                tracing::info!(path, "No config file found, using defaults");
                Self::default()
            },
        }
    }

    /// Validate configuration, logging warnings for issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::warn!(listen_addr = %self.listen_addr, "listen_addr is not a valid socket address");
        }
        if self.rooms.is_empty() {
            tracing::warn!("No rooms configured; every join will be refused");
        }
        for room in &self.rooms {
            if room.width == 0 || room.height == 0 {
                tracing::warn!(room = %room.id, "Room has a zero-sized grid");
            }
        }
        if self.auth.token_secret.is_none() {
            tracing::warn!("No token_secret configured; credential verification is disabled");
        }
    }
}
