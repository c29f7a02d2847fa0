//! Shared fixtures for component tests.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{ReconnectPolicy, UserId},
    infrastructure::transport::{MemoryPeer, MemoryServer, MemoryTransport},
};

use super::{connection::ConnectionManager, router::EventRouter};

pub(crate) struct TestHarness {
    pub router: Arc<EventRouter>,
    pub server: MemoryServer,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_policy(ReconnectPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        })
    }

    pub fn with_policy(policy: ReconnectPolicy) -> Self {
        let (transport, server) = MemoryTransport::new();
        let manager = Arc::new(ConnectionManager::new(Arc::new(transport), policy));
        Self {
            router: Arc::new(EventRouter::new(manager)),
            server,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        self.router.manager()
    }

    /// Acquire a connection for `identity` and wait until it is live.
    pub async fn connect_as(&mut self, identity: &str) -> MemoryPeer {
        self.manager().acquire(user(identity), Some(format!("token-{identity}")));
        let peer = self.server.accept().await.expect("memory server closed");
        let manager = self.manager().clone();
        eventually(move || manager.is_connected()).await;
        peer
    }
}

pub(crate) fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
