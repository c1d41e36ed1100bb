pub mod chat;
pub mod chat_store;
pub mod config;
pub mod health;
pub mod identity;
pub mod movement;
pub mod profiles;
pub mod registry;
pub mod session;
pub mod spaces;
pub mod state;

use axum::Router;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config, using the
/// in-process collaborator implementations.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Build the router over externally-assembled state (tests and deployments
/// that inject their own collaborators).
pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .route("/ws", axum::routing::get(session::ws_handler))
        .route("/healthz", axum::routing::get(health::healthz))
        .with_state(state)
}
