//! WebSocket route configuration
//!
//! This module configures the relay endpoint that streams client audio to the
//! recognition backend.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws_relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoints
///
/// - `GET /` - WebSocket upgrade for a relay session
/// - `GET /ws` - alias of `/`
///
/// Connection limits are applied in main.rs after state is available.
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(ws_relay_handler))
        .route("/ws", get(ws_relay_handler))
        .layer(TraceLayer::new_for_http())
}
