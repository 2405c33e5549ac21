use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::adapter::BackendStreamAdapter;
use crate::core::backend::RecognitionBackend;
use crate::core::registry::SessionRegistry;

/// Why a WebSocket connection was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

/// Application state that can be shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// Pre-configured, already-authenticated recognition backend
    pub backend: Arc<dyn RecognitionBackend>,
    pub registry: Arc<SessionRegistry>,
    /// Cancelled once the server starts shutting down
    pub shutdown: CancellationToken,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn RecognitionBackend>) -> Arc<Self> {
        Arc::new(Self {
            config,
            backend,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: CancellationToken::new(),
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Adapter for a new session, configured with the server-wide recognition
    /// settings.
    pub fn session_adapter(&self) -> BackendStreamAdapter {
        BackendStreamAdapter::new(self.backend.clone(), self.config.recognition.clone())
            .with_write_timeout(self.config.audio_write_timeout())
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Reserve a WebSocket slot for `ip`, honoring the global and per-IP caps.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections;
        let reserved = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| match max_global {
                Some(max) if count >= max => None,
                _ => Some(count + 1),
            });
        if reserved.is_err() {
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        let max_per_ip = self.config.max_connections_per_ip as usize;
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= max_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;

        Ok(())
    }

    /// Return a slot taken by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });

        if let Some(mut per_ip) = self.ip_connections.get_mut(&ip) {
            *per_ip = per_ip.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
