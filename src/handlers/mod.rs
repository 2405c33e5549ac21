//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `ws` - WebSocket relay to the recognition backend

pub mod api;
pub mod ws;

pub use ws::ws_relay_handler;
