//! Application state for the HTTP server.

use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::engine::Engine;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub tokens: Arc<TokenIssuer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, config: Config) -> Self {
        Self {
            engine,
            tokens: Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes())),
            config: Arc::new(config),
        }
    }
}
