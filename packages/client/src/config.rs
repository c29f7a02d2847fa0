//! Runtime configuration of the synchronization core.

use std::time::Duration;

use crate::{domain::ReconnectPolicy, realtime::presence::DEFAULT_HEARTBEAT_INTERVAL};

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// WebSocket endpoint of the realtime server
    pub server_url: String,
    /// Base URL of the notification REST API
    pub api_base_url: String,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn with_heartbeat_secs(mut self, secs: u64) -> Self {
        // tokio intervals require a non-zero period
        self.heartbeat_interval = Duration::from_secs(secs.max(1));
        self
    }
}
