use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::chat_store::{ChatStore, MemoryChatStore};
use crate::config::ServerConfig;
use crate::identity::{IdentityVerifier, TokenVerifier};
use crate::profiles::{ProfileDirectory, StaticProfiles};
use crate::registry::RoomRegistry;
use crate::spaces::{SpaceGeometry, StaticSpaces};

pub type SharedRoomRegistry = Arc<RwLock<RoomRegistry>>;

/// Process-wide state handed to every connection handler. The registry is
/// the shared mutable core; the collaborators are injected so tests and
/// deployments can swap implementations.
#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomRegistry,
    pub identity: Arc<dyn IdentityVerifier>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub spaces: Arc<dyn SpaceGeometry>,
    pub chat_store: Arc<dyn ChatStore>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    /// Build state with the in-process collaborator implementations derived
    /// from the config.
    pub fn new(config: ServerConfig) -> Self {
        let identity = Arc::new(TokenVerifier::new(config.auth.token_secret.clone()));
        let spaces = Arc::new(StaticSpaces::from_defs(&config.rooms));
        let chat_store = Arc::new(MemoryChatStore::new(config.limits.chat_history_cap));
        Self::with_collaborators(
            config,
            identity,
            Arc::new(StaticProfiles::permissive()),
            spaces,
            chat_store,
        )
    }

    pub fn with_collaborators(
        config: ServerConfig,
        identity: Arc<dyn IdentityVerifier>,
        profiles: Arc<dyn ProfileDirectory>,
        spaces: Arc<dyn SpaceGeometry>,
        chat_store: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(RoomRegistry::new())),
            identity,
            profiles,
            spaces,
            chat_store,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// RAII guard for the global WebSocket connection count.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_counts_up_and_down() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _a = ConnectionGuard::new(Arc::clone(&count));
            let _b = ConnectionGuard::new(Arc::clone(&count));
            assert_eq!(count.load(Ordering::Relaxed), 2);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
