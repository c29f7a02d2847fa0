//! Facade wiring every realtime component onto one connection manager.

use std::sync::Arc;

use estate_shared::time::{Clock, SystemClock};

use crate::{
    config::SyncConfig,
    domain::{ApiError, CredentialStore, Navigator, NotificationApi, Role, Transport, UserId},
    infrastructure::{rest::HttpNotificationApi, transport::WebSocketTransport},
};

use super::{
    admin::AdminOverrideChannel,
    connection::{Connection, ConnectionManager},
    messaging::MessagingChannel,
    notification::NotificationSynchronizer,
    presence::PresenceTracker,
    router::EventRouter,
};

/// External collaborators of the core.
pub struct CoreDependencies {
    pub transport: Arc<dyn Transport>,
    pub api: Arc<dyn NotificationApi>,
    pub credentials: Arc<dyn CredentialStore>,
    pub navigator: Arc<dyn Navigator>,
    pub clock: Arc<dyn Clock>,
}

pub struct RealtimeCore {
    router: Arc<EventRouter>,
    credentials: Arc<dyn CredentialStore>,
    presence: PresenceTracker,
    messaging: MessagingChannel,
    notifications: NotificationSynchronizer,
    _admin: AdminOverrideChannel,
}

impl RealtimeCore {
    pub fn new(config: &SyncConfig, role: Role, dependencies: CoreDependencies) -> Self {
        let CoreDependencies {
            transport,
            api,
            credentials,
            navigator,
            clock,
        } = dependencies;

        let manager = Arc::new(ConnectionManager::new(transport, config.reconnect.clone()));
        let router = Arc::new(EventRouter::new(manager));

        let presence =
            PresenceTracker::new(router.clone(), clock.clone(), config.heartbeat_interval);
        let messaging = MessagingChannel::new(router.clone());
        let notifications = NotificationSynchronizer::new(router.clone(), api, role, clock);
        let admin = AdminOverrideChannel::new(router.clone(), credentials.clone(), navigator);

        Self {
            router,
            credentials,
            presence,
            messaging,
            notifications,
            _admin: admin,
        }
    }

    /// Build a core talking to a real server over WebSocket and HTTP.
    pub fn with_network(
        config: &SyncConfig,
        role: Role,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let api = HttpNotificationApi::new(config.api_base_url.clone(), credentials.clone())?;
        let dependencies = CoreDependencies {
            transport: Arc::new(WebSocketTransport::new(config.server_url.clone())),
            api: Arc::new(api),
            credentials,
            navigator,
            clock: Arc::new(SystemClock),
        };
        Ok(Self::new(config, role, dependencies))
    }

    /// Connect as `identity` using the stored credential.
    pub fn start(&self, identity: UserId) -> Connection {
        self.router
            .manager()
            .acquire(identity, self.credentials.token())
    }

    pub fn stop(&self) {
        self.router.manager().release();
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn messaging(&self) -> &MessagingChannel {
        &self.messaging
    }

    pub fn notifications(&self) -> &NotificationSynchronizer {
        &self.notifications
    }
}
