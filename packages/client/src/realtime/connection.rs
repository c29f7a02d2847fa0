//! Connection Manager: owns the single persistent connection per identity.
//!
//! `acquire` is idempotent per identity and `release` is idempotent overall, so
//! each identity transition triggers exactly one connect/disconnect cycle. A
//! background driver pumps frames between the transport link and the handler
//! registry, synthesizes `connect` / `disconnect` / `error` events, and
//! re-establishes lost links following the `ReconnectPolicy`.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::{
        ReconnectPolicy, Transport, TransportError, TransportLink, UserId,
        reconnect::should_attempt_reconnect,
    },
    infrastructure::dto::websocket::{Envelope, events},
};

use super::router::HandlerRegistry;

/// `disconnect` reason when the client tears the connection down itself.
pub const REASON_CLIENT_DISCONNECT: &str = "io client disconnect";
/// `disconnect` reason when the link was lost.
pub const REASON_TRANSPORT_CLOSE: &str = "transport close";

/// Lifecycle flags shared between the manager and the driver task.
#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    /// Serializes connect/disconnect transitions; `true` once released
    released: Mutex<bool>,
}

/// Handle to the live connection of one identity.
#[derive(Debug, Clone)]
pub struct Connection {
    identity: UserId,
    link: Arc<LinkState>,
}

impl Connection {
    fn new(identity: UserId) -> Self {
        Self {
            identity,
            link: Arc::new(LinkState::default()),
        }
    }

    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same underlying connection.
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

struct ActiveConnection {
    connection: Connection,
    outbound: mpsc::UnboundedSender<String>,
    driver: JoinHandle<()>,
}

impl ActiveConnection {
    /// The driver exits for good after an auth rejection or once retries run out.
    fn is_live(&self) -> bool {
        !self.driver.is_finished()
    }
}

/// Owner of the single connection.
///
/// Handlers of the `connect`/`disconnect` events raised by `acquire` or
/// `release` must not call `acquire`/`release` themselves.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    registry: Arc<HandlerRegistry>,
    /// Serializes acquire/release
    lifecycle: Mutex<()>,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            policy,
            registry: Arc::new(HandlerRegistry::default()),
            lifecycle: Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    pub(crate) fn registry(&self) -> Arc<HandlerRegistry> {
        self.registry.clone()
    }

    /// Return the connection for `identity`, creating it if needed.
    ///
    /// A live connection for the same identity is returned unchanged. A
    /// connection for another identity, or one whose driver has given up, is
    /// torn down first. Must be called from within a tokio runtime.
    pub fn acquire(&self, identity: UserId, credential: Option<String>) -> Connection {
        let _lifecycle = self.lifecycle.lock();

        let previous = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(current)
                    if current.connection.identity == identity && current.is_live() =>
                {
                    tracing::debug!("Reusing connection for '{}'", identity);
                    return current.connection.clone();
                }
                _ => active.take(),
            }
        };

        if let Some(previous) = previous {
            if previous.connection.identity == identity {
                tracing::info!(
                    "Connection for '{}' stopped retrying, opening a new one",
                    identity
                );
            } else {
                tracing::info!(
                    "Identity changed from '{}' to '{}', tearing down previous connection",
                    previous.connection.identity,
                    identity
                );
            }
            self.teardown(previous);
        }

        if credential.is_none() {
            tracing::warn!(
                "No credential available for '{}', connecting anonymously",
                identity
            );
        }

        tracing::info!("Opening connection for '{}'", identity);
        let connection = Connection::new(identity);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        // Hold the slot while spawning so early `connect` handlers see the new connection
        let mut active = self.active.lock();
        let driver = tokio::spawn(drive(
            self.transport.clone(),
            credential,
            self.registry.clone(),
            connection.link.clone(),
            outbound_rx,
            self.policy.clone(),
        ));
        *active = Some(ActiveConnection {
            connection: connection.clone(),
            outbound: outbound_tx,
            driver,
        });

        connection
    }

    /// Disconnect and forget the current connection. No-op without one.
    pub fn release(&self) {
        let _lifecycle = self.lifecycle.lock();
        let previous = self.active.lock().take();
        match previous {
            Some(previous) => {
                tracing::info!("Releasing connection for '{}'", previous.connection.identity);
                self.teardown(previous);
            }
            None => tracing::debug!("Release requested without a connection"),
        }
    }

    fn teardown(&self, previous: ActiveConnection) {
        let ActiveConnection {
            connection,
            outbound,
            driver,
        } = previous;
        drop(outbound);
        driver.abort();

        let mut released = connection.link.released.lock();
        *released = true;
        if connection.link.connected.swap(false, Ordering::SeqCst) {
            self.registry.dispatch(
                events::DISCONNECT,
                &json!({ "reason": REASON_CLIENT_DISCONNECT }),
            );
        }
    }

    pub fn current(&self) -> Option<Connection> {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.connection.clone())
    }

    pub fn current_identity(&self) -> Option<UserId> {
        self.current().map(|connection| connection.identity)
    }

    pub fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|connection| connection.is_connected())
    }

    /// Queue a frame on the current connection. Returns `false` without one.
    pub(crate) fn send(&self, frame: String) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| active.outbound.send(frame).is_ok())
    }
}

enum PumpOutcome {
    Released,
    Lost,
}

async fn drive(
    transport: Arc<dyn Transport>,
    credential: Option<String>,
    registry: Arc<HandlerRegistry>,
    link: Arc<LinkState>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    policy: ReconnectPolicy,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        let error = match transport.connect(credential.as_deref()).await {
            Ok(transport_link) => {
                if !mark_connected(&link, &registry) {
                    return;
                }
                failed_attempts = 0;

                let outcome = pump(transport_link, &mut outbound_rx, &registry).await;
                mark_disconnected(&link, &registry);
                match outcome {
                    PumpOutcome::Released => return,
                    PumpOutcome::Lost => TransportError::Closed,
                }
            }
            Err(error) => {
                tracing::warn!("Connection attempt failed: {}", error);
                registry.dispatch(events::ERROR, &json!({ "message": error.to_string() }));
                failed_attempts += 1;
                error
            }
        };

        if !should_attempt_reconnect(&error, failed_attempts, policy.max_attempts) {
            tracing::error!(
                "Giving up on the connection after {} failed attempt(s): {}",
                failed_attempts,
                error
            );
            return;
        }

        tracing::info!(
            "Reconnecting in {:?}... (attempt {}/{})",
            policy.interval,
            failed_attempts + 1,
            policy.max_attempts
        );
        tokio::time::sleep(policy.interval).await;
    }
}

/// Flip to connected and announce it, unless the connection was released meanwhile.
fn mark_connected(link: &LinkState, registry: &HandlerRegistry) -> bool {
    let released = link.released.lock();
    if *released {
        tracing::debug!("Discarding link established after release");
        return false;
    }
    tracing::info!("Connected");
    // `is_connected` turns true only once every connect handler has run
    registry.dispatch(events::CONNECT, &Value::Null);
    link.connected.store(true, Ordering::SeqCst);
    true
}

fn mark_disconnected(link: &LinkState, registry: &HandlerRegistry) {
    let released = link.released.lock();
    if *released {
        return;
    }
    if link.connected.swap(false, Ordering::SeqCst) {
        tracing::warn!("Connection lost");
        registry.dispatch(
            events::DISCONNECT,
            &json!({ "reason": REASON_TRANSPORT_CLOSE }),
        );
    }
}

async fn pump(
    transport_link: TransportLink,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    registry: &HandlerRegistry,
) -> PumpOutcome {
    let TransportLink {
        outbound,
        mut inbound,
    } = transport_link;

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if outbound.send(frame).is_err() {
                        return PumpOutcome::Lost;
                    }
                }
                None => return PumpOutcome::Released,
            },
            frame = inbound.recv() => match frame {
                Some(frame) => dispatch_frame(registry, &frame),
                None => return PumpOutcome::Lost,
            },
        }
    }
}

fn dispatch_frame(registry: &HandlerRegistry, frame: &str) {
    let envelope: Envelope = match serde_json::from_str(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Discarding malformed frame: {}", e);
            return;
        }
    };

    if events::is_reserved(&envelope.event) {
        tracing::warn!("Ignoring reserved event '{}' sent by server", envelope.event);
        return;
    }

    let delivered = registry.dispatch(&envelope.event, &envelope.data);
    tracing::trace!("Delivered '{}' to {} handler(s)", envelope.event, delivered);
}
