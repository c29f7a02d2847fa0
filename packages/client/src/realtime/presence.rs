//! Presence Tracker: online / away / offline state of identities.
//!
//! State is mutated only by server events. The tracker also owns the heartbeat
//! task, which runs while the connection is live.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use estate_shared::time::Clock;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    domain::{PresenceRecord, PresenceStatus, PresenceUpdate, UserId},
    infrastructure::dto::websocket::{
        GetStatusRequest, HeartbeatRequest, StatusChangedPayload, StatusResponsePayload,
        UpdateStatusRequest, UserOfflinePayload, UserOnlinePayload, events,
    },
};

use super::router::{EventHandler, EventRouter, Handler, Subscription};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Shorter intervals are raised to this.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct PresenceState {
    records: HashMap<UserId, PresenceRecord>,
    online: HashSet<UserId>,
}

impl PresenceState {
    /// Record and online-set change together under one lock.
    fn apply(&mut self, update: PresenceUpdate) {
        let (user_id, record) = update.into_record();
        if record.status.counts_as_online() {
            self.online.insert(user_id.clone());
        } else {
            self.online.remove(&user_id);
        }
        tracing::debug!("Presence of '{}' is now {}", user_id, record.status);
        self.records.insert(user_id, record);
    }
}

struct Heartbeat {
    router: Weak<EventRouter>,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    fn start(&self) {
        let router = self.router.clone();
        let period = self.period;
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(router) = router.upgrade() else {
                    break;
                };
                if router.is_connected() {
                    router.emit(events::PRESENCE_HEARTBEAT, &HeartbeatRequest {});
                }
            }
        }));
        tracing::debug!("Heartbeat started ({:?})", period);
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("Heartbeat stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

pub struct PresenceTracker {
    router: Arc<EventRouter>,
    state: Arc<Mutex<PresenceState>>,
    heartbeat: Arc<Heartbeat>,
    subscriptions: Vec<Subscription>,
}

impl PresenceTracker {
    pub fn new(
        router: Arc<EventRouter>,
        clock: Arc<dyn Clock>,
        heartbeat_interval: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(PresenceState::default()));
        let heartbeat = Arc::new(Heartbeat {
            router: Arc::downgrade(&router),
            period: heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL),
            task: Mutex::new(None),
        });

        let mut subscriptions = Vec::new();

        let online_state = state.clone();
        let on_online: Handler<PresenceUpdate> = Arc::new(move |update: PresenceUpdate| {
            online_state.lock().apply(update);
        });
        subscriptions.push(router.on_decoded::<UserOnlinePayload, PresenceUpdate>(
            events::PRESENCE_USER_ONLINE,
            on_online,
        ));

        let offline_state = state.clone();
        let offline_clock = clock.clone();
        let on_offline: Handler<PresenceUpdate> = Arc::new(move |mut update: PresenceUpdate| {
            update.last_seen = update.last_seen.or_else(|| Some(offline_clock.now()));
            offline_state.lock().apply(update);
        });
        subscriptions.push(router.on_decoded::<UserOfflinePayload, PresenceUpdate>(
            events::PRESENCE_USER_OFFLINE,
            on_offline,
        ));

        let changed_state = state.clone();
        let changed_clock = clock;
        let on_changed: Handler<PresenceUpdate> = Arc::new(move |mut update: PresenceUpdate| {
            if update.status == PresenceStatus::Offline && update.last_seen.is_none() {
                update.last_seen = Some(changed_clock.now());
            }
            changed_state.lock().apply(update);
        });
        subscriptions.push(router.on_decoded::<StatusChangedPayload, PresenceUpdate>(
            events::PRESENCE_STATUS_CHANGED,
            on_changed,
        ));

        let response_state = state.clone();
        let on_response: Handler<StatusResponsePayload> = Arc::new(move |payload: StatusResponsePayload| {
            let mut state = response_state.lock();
            for entry in payload.users {
                match PresenceUpdate::try_from(entry) {
                    Ok(update) => state.apply(update),
                    Err(e) => tracing::warn!("Skipping invalid status entry: {}", e),
                }
            }
        });
        subscriptions.push(router.on_typed(events::PRESENCE_STATUS_RESPONSE, on_response));

        let connect_heartbeat = heartbeat.clone();
        let on_connect: EventHandler = Arc::new(move |_: &Value| connect_heartbeat.start());
        subscriptions.push(router.on(events::CONNECT, on_connect));

        let disconnect_heartbeat = heartbeat.clone();
        let on_disconnect: EventHandler = Arc::new(move |_: &Value| disconnect_heartbeat.stop());
        subscriptions.push(router.on(events::DISCONNECT, on_disconnect));

        if router.is_connected() {
            heartbeat.start();
        }

        Self {
            router,
            state,
            heartbeat,
            subscriptions,
        }
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.state.lock().online.contains(user_id)
    }

    /// Status of `user_id`; identities never reported are `Offline`.
    pub fn status_of(&self, user_id: &UserId) -> PresenceStatus {
        self.state
            .lock()
            .records
            .get(user_id)
            .map_or(PresenceStatus::Offline, |record| record.status)
    }

    pub fn last_seen_of(&self, user_id: &UserId) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .records
            .get(user_id)
            .and_then(|record| record.last_seen)
    }

    pub fn record_of(&self, user_id: &UserId) -> Option<PresenceRecord> {
        self.state.lock().records.get(user_id).cloned()
    }

    /// Currently online identities, sorted.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.state.lock().online.iter().cloned().collect();
        users.sort();
        users
    }

    /// Ask the server to change the caller's status.
    ///
    /// Local state changes only when the server echoes `presence:status-changed`.
    pub fn update_my_status(&self, status: PresenceStatus) {
        self.router.emit(
            events::PRESENCE_UPDATE_STATUS,
            &UpdateStatusRequest {
                status: status.as_str().to_string(),
            },
        );
    }

    /// Query the status of several identities at once.
    pub fn request_status(&self, user_ids: &[UserId]) {
        if user_ids.is_empty() {
            return;
        }
        let request = GetStatusRequest {
            user_ids: user_ids.iter().map(|id| id.as_str().to_string()).collect(),
        };
        self.router.emit(events::PRESENCE_GET_STATUS, &request);
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
        self.heartbeat.stop();
    }
}
