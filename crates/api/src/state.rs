use std::sync::Arc;

use crate::config::ServerConfig;
use crate::sessions::SessionCoordinator;
use crate::signaling::HostClient;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: imperium_db::DbPool,
    /// Server configuration, immutable after startup.
    pub config: Arc<ServerConfig>,
    /// Outbound client for host endpoints.
    pub hosts: HostClient,
    /// Session lifecycle coordinator.
    pub sessions: Arc<SessionCoordinator>,
}

impl AppState {
    /// Wire up state from a pool and configuration.
    pub fn new(pool: imperium_db::DbPool, config: ServerConfig) -> Self {
        let hosts = HostClient::new(std::time::Duration::from_secs(
            config.host_request_timeout_secs,
        ));
        let sessions = Arc::new(SessionCoordinator::new(pool.clone(), hosts.clone()));
        Self {
            pool,
            config: Arc::new(config),
            hosts,
            sessions,
        }
    }
}
