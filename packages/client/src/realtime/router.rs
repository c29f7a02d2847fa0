//! Event Router: typed publish/subscribe over the single connection.
//!
//! Handlers live in a registry owned by the connection manager, so
//! subscriptions survive reconnects and identity changes. A handler is
//! identified by its `Arc` allocation: subscribing the same `Arc` again for the
//! same event detaches the previous registration before attaching, so a
//! handler is never invoked twice for one delivery. Each registration gets its
//! own id, and a `Subscription` only ever detaches the registration it created.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    domain::UserId,
    infrastructure::dto::websocket::Envelope,
};

use super::connection::ConnectionManager;

/// Raw handler receiving the event payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Typed handler receiving a decoded payload.
pub type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Identity of a handler allocation.
///
/// The registry keeps the allocation alive while registered, so the address
/// cannot be reused by another live handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HandlerKey(usize);

/// Identity of one `attach` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegistrationId(u64);

impl HandlerKey {
    fn of<T: ?Sized>(handler: &Arc<T>) -> Self {
        Self(Arc::as_ptr(handler) as *const () as usize)
    }
}

struct Registration {
    key: HandlerKey,
    id: RegistrationId,
    handler: EventHandler,
}

/// Handler registry keyed by event name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    fn attach(&self, event: &str, key: HandlerKey, handler: EventHandler) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write();
        let registrations = handlers.entry(event.to_string()).or_default();
        registrations.retain(|registration| registration.key != key);
        registrations.push(Registration { key, id, handler });
        id
    }

    fn detach(&self, event: &str, id: RegistrationId) {
        let mut handlers = self.handlers.write();
        if let Some(registrations) = handlers.get_mut(event) {
            registrations.retain(|registration| registration.id != id);
            if registrations.is_empty() {
                handlers.remove(event);
            }
        }
    }

    /// Invoke every handler of `event` in registration order.
    ///
    /// The registry lock is released before handlers run, so handlers may
    /// subscribe, unsubscribe or dispatch further events.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(event)
            .map(|registrations| registrations.iter().map(|r| r.handler.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }
}

/// Unsubscribe handle returned by every subscription.
///
/// Dropping the handle keeps the handler attached.
#[must_use = "keep the Subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<HandlerRegistry>,
    event: String,
    id: RegistrationId,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Detach the handler. Safe to call repeatedly, and after the connection is gone.
    ///
    /// A handle whose registration was replaced by a later subscription of the
    /// same handler detaches nothing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&self.event, self.id);
        }
    }
}

/// Publish/subscribe façade over the connection manager.
pub struct EventRouter {
    manager: Arc<ConnectionManager>,
    registry: Arc<HandlerRegistry>,
}

impl EventRouter {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        let registry = manager.registry();
        Self { manager, registry }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn current_identity(&self) -> Option<UserId> {
        self.manager.current_identity()
    }

    /// Subscribe a raw handler to `event`.
    pub fn on(&self, event: &str, handler: EventHandler) -> Subscription {
        let key = HandlerKey::of(&handler);
        self.attach(event, key, handler)
    }

    /// Subscribe a handler receiving the payload decoded as `D`.
    pub fn on_typed<D>(&self, event: &str, handler: Handler<D>) -> Subscription
    where
        D: DeserializeOwned + 'static,
    {
        self.on_decoded::<D, D>(event, handler)
    }

    /// Subscribe a handler receiving the payload decoded as `D` and converted into `T`.
    ///
    /// Payloads failing to decode or convert are logged and skipped for this handler.
    pub fn on_decoded<D, T>(&self, event: &str, handler: Handler<T>) -> Subscription
    where
        D: DeserializeOwned + 'static,
        T: TryFrom<D> + 'static,
        T::Error: Display,
    {
        let key = HandlerKey::of(&handler);
        let event_name = event.to_string();
        let wrapped: EventHandler = Arc::new(move |payload: &Value| {
            let dto = match D::deserialize(payload) {
                Ok(dto) => dto,
                Err(e) => {
                    tracing::warn!("Discarding '{}' payload that failed to decode: {}", event_name, e);
                    return;
                }
            };
            match T::try_from(dto) {
                Ok(value) => handler(value),
                Err(e) => tracing::warn!("Discarding invalid '{}' payload: {}", event_name, e),
            }
        });
        self.attach(event, key, wrapped)
    }

    fn attach(&self, event: &str, key: HandlerKey, handler: EventHandler) -> Subscription {
        let id = self.registry.attach(event, key, handler);
        Subscription {
            registry: Arc::downgrade(&self.registry),
            event: event.to_string(),
            id,
        }
    }

    /// Fire-and-forget request to the server.
    ///
    /// Queued while an acquired connection is re-establishing its link; dropped
    /// when no connection is acquired.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to serialize '{}' payload: {}", event, e);
                return;
            }
        };
        let frame = match serde_json::to_string(&Envelope {
            event: event.to_string(),
            data,
        }) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to encode '{}' frame: {}", event, e);
                return;
            }
        };

        if self.manager.send(frame) {
            tracing::debug!("Emitted '{}'", event);
        } else {
            tracing::debug!("No connection, dropped '{}'", event);
        }
    }

    /// Deliver an event to subscribers as if it had arrived from the server.
    pub(crate) fn deliver(&self, event: &str, payload: &Value) -> usize {
        self.registry.dispatch(event, payload)
    }
}
