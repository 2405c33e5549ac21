//! # WebSocket Relay Handler
//!
//! Each accepted connection becomes one relay session.
//!
//! ## Protocol
//!
//! **Client to server:**
//! - **Binary frames** - audio chunks in the configured encoding, forwarded in order
//! - Pong frames - acknowledge a liveness probe
//! - Text frames are ignored
//!
//! **Server to client:**
//! - `{"transcript": "...", "isFinal": false, "languageCode": "en-US"}` - one text frame
//!   per recognition result, `languageCode` only when the backend reports it
//! - Ping frames - liveness probes, one per heartbeat interval
//! - Close `1011 "backend error"` when the recognition stream fails
//! - Close `1001 "server shutting down"` on shutdown
//!
//! A client that does not answer a probe before the next sweep is disconnected
//! without a close handshake.

mod handler;

pub use handler::ws_relay_handler;
