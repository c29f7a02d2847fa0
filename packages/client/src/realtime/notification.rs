//! Notification Synchronizer: notification list and unread counter.
//!
//! `fetch_all` loads the authoritative state from the REST API. Read marks
//! are applied optimistically and never rolled back; the next fetch or push
//! event reconciles. Push events prepend to the list.

use std::sync::Arc;

use estate_shared::time::Clock;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    domain::{
        Announcement, ApiError, NewNotification, Notification, NotificationApi, NotificationId,
        NotificationPage, NotificationSnapshot, Role,
    },
    infrastructure::dto::websocket::{AnnouncementPayload, NotificationDto, events},
};

use super::router::{EventRouter, Handler, Subscription};

#[derive(Debug, Default)]
struct NotificationState {
    notifications: Vec<Notification>,
    unread_count: usize,
}

impl NotificationState {
    fn replace(&mut self, page: NotificationPage) {
        self.notifications = page.notifications;
        self.unread_count = page.unread_count;
    }

    fn prepend(&mut self, notification: Notification) {
        if !notification.read {
            self.unread_count += 1;
        }
        self.notifications.insert(0, notification);
    }

    fn mark_read(&mut self, id: &NotificationId) -> bool {
        let Some(notification) = self
            .notifications
            .iter_mut()
            .find(|notification| &notification.id == id)
        else {
            return false;
        };
        if notification.read {
            return false;
        }
        notification.read = true;
        self.unread_count = self.unread_count.saturating_sub(1);
        true
    }

    fn mark_all_read(&mut self) {
        for notification in self.notifications.iter_mut() {
            notification.read = true;
        }
        self.unread_count = 0;
    }
}

pub struct NotificationSynchronizer {
    api: Arc<dyn NotificationApi>,
    state: Arc<Mutex<NotificationState>>,
    subscriptions: Vec<Subscription>,
}

impl NotificationSynchronizer {
    pub fn new(
        router: Arc<EventRouter>,
        api: Arc<dyn NotificationApi>,
        role: Role,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = Arc::new(Mutex::new(NotificationState::default()));
        let mut subscriptions = Vec::new();

        let push_state = state.clone();
        let on_notification: Handler<Notification> = Arc::new(move |notification: Notification| {
            tracing::debug!("Notification '{}' pushed", notification.id);
            push_state.lock().prepend(notification);
        });
        subscriptions.push(router.on_decoded::<NotificationDto, Notification>(
            events::NEW_NOTIFICATION,
            on_notification,
        ));

        let announcement_state = state.clone();
        let on_announcement: Handler<Announcement> = Arc::new(move |announcement: Announcement| {
            if !role.accepts_target(&announcement.target) {
                tracing::debug!(
                    "Discarding announcement for '{}' (role '{}')",
                    announcement.target,
                    role
                );
                return;
            }
            let id = match NotificationId::new(Uuid::new_v4().to_string()) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Failed to assign announcement id: {}", e);
                    return;
                }
            };
            let notification = announcement.into_notification(id, clock.now());
            announcement_state.lock().prepend(notification);
        });
        subscriptions.push(router.on_decoded::<AnnouncementPayload, Announcement>(
            events::NEW_ANNOUNCEMENT,
            on_announcement,
        ));

        Self {
            api,
            state,
            subscriptions,
        }
    }

    /// Replace local state with the server's list.
    ///
    /// An unreachable backend resets to the empty state and is not an error.
    pub async fn fetch_all(&self) -> Result<(), ApiError> {
        match self.api.list().await {
            Ok(page) => {
                tracing::debug!(
                    "Fetched {} notification(s), {} unread",
                    page.notifications.len(),
                    page.unread_count
                );
                self.state.lock().replace(page);
                Ok(())
            }
            Err(e) if e.is_backend_unavailable() => {
                tracing::warn!("Notification backend unavailable, showing none: {}", e);
                self.state.lock().replace(NotificationPage::default());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to fetch notifications: {}", e);
                Err(e)
            }
        }
    }

    /// Mark one notification read locally, then on the server.
    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        if !self.state.lock().mark_read(id) {
            tracing::debug!("Notification '{}' already read or unknown", id);
        }
        settle("mark notification as read", self.api.mark_read(id).await)
    }

    pub async fn mark_all_as_read(&self) -> Result<(), ApiError> {
        self.state.lock().mark_all_read();
        settle("mark all notifications as read", self.api.mark_all_read().await)
    }

    /// Persist a new notification, then refresh from the server.
    pub async fn create(&self, notification: &NewNotification) -> Result<(), ApiError> {
        match self.api.create(notification).await {
            Ok(()) => self.fetch_all().await,
            Err(e) => settle("create notification", Err(e)),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.lock().unread_count
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        let state = self.state.lock();
        NotificationSnapshot {
            notifications: state.notifications.clone(),
            unread_count: state.unread_count,
        }
    }
}

impl Drop for NotificationSynchronizer {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// Swallow backend-unavailable failures, report the rest.
fn settle(action: &str, result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_backend_unavailable() => {
            tracing::warn!("Could not {}, backend unavailable: {}", action, e);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Could not {}: {}", action, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::gateway::MockNotificationApi, realtime::testing::TestHarness};
    use estate_shared::time::{FixedClock, utc_from_millis};
    use serde_json::{Value, json};

    const NOW_MILLIS: i64 = 1_700_000_000_000;

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id).unwrap(),
            kind: "message".to_string(),
            title: format!("title {id}"),
            message: "body".to_string(),
            link: None,
            read,
            created_at: None,
            metadata: Value::Null,
        }
    }

    fn page(notifications: Vec<Notification>) -> NotificationPage {
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        NotificationPage {
            notifications,
            unread_count,
        }
    }

    fn create_synchronizer(
        harness: &TestHarness,
        api: MockNotificationApi,
        role: &str,
    ) -> NotificationSynchronizer {
        NotificationSynchronizer::new(
            harness.router.clone(),
            Arc::new(api),
            Role::new(role).unwrap(),
            Arc::new(FixedClock::from_millis(NOW_MILLIS)),
        )
    }

    fn unavailable() -> ApiError {
        ApiError::Unavailable("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_fetch_all_replaces_local_state() {
        // テスト項目: fetch_all はサーバーの一覧と未読数でローカル状態を置き換える
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        let listed = page(vec![notification("n1", false), notification("n2", true)]);
        api.expect_list()
            .times(1)
            .returning(move || Ok(listed.clone()));
        let synchronizer = create_synchronizer(&harness, api, "buyer");

        // when (操作):
        let result = synchronizer.fetch_all().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(synchronizer.notifications().len(), 2);
        assert_eq!(synchronizer.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_degrades_when_backend_unavailable() {
        // テスト項目: バックエンド停止時はエラーにせず空の状態へリセットする
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        api.expect_list().times(1).returning(|| Err(unavailable()));
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        harness
            .router
            .deliver(events::NEW_NOTIFICATION, &json!({"id": "n1", "read": false}));

        // when (操作):
        let result = synchronizer.fetch_all().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(synchronizer.notifications().is_empty());
        assert_eq!(synchronizer.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_reports_other_failures() {
        // テスト項目: バックエンド停止以外の失敗は呼び出し元へ返され、状態は変わらない
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        api.expect_list().times(1).returning(|| {
            Err(ApiError::Status {
                status: 500,
                message: "boom".to_string(),
            })
        });
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        harness
            .router
            .deliver(events::NEW_NOTIFICATION, &json!({"id": "n1"}));

        // when (操作):
        let result = synchronizer.fetch_all().await;

        // then (期待する結果):
        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
        assert_eq!(synchronizer.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_never_goes_negative() {
        // テスト項目: 既読済みの通知を再度既読にしても未読数は減らず負にならない
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        let listed = page(vec![notification("n1", false), notification("n2", true)]);
        api.expect_list()
            .times(1)
            .returning(move || Ok(listed.clone()));
        api.expect_mark_read().times(3).returning(|_| Ok(()));
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        synchronizer.fetch_all().await.unwrap();
        let n1 = NotificationId::new("n1").unwrap();
        let n2 = NotificationId::new("n2").unwrap();

        // when (操作):
        synchronizer.mark_as_read(&n1).await.unwrap();
        synchronizer.mark_as_read(&n1).await.unwrap();
        synchronizer.mark_as_read(&n2).await.unwrap();

        // then (期待する結果):
        assert_eq!(synchronizer.unread_count(), 0);
        assert!(synchronizer.notifications().iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn test_mark_as_read_keeps_optimistic_change_on_failure() {
        // テスト項目: サーバー呼び出しが失敗しても楽観的な既読化はロールバックされない
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        api.expect_mark_read()
            .withf(|id| id.as_str() == "n1")
            .times(1)
            .returning(|_| {
                Err(ApiError::Status {
                    status: 404,
                    message: "not found".to_string(),
                })
            });
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        harness
            .router
            .deliver(events::NEW_NOTIFICATION, &json!({"id": "n1", "read": false}));

        // when (操作):
        let result = synchronizer
            .mark_as_read(&NotificationId::new("n1").unwrap())
            .await;

        // then (期待する結果):
        assert!(result.is_err());
        assert_eq!(synchronizer.unread_count(), 0);
        assert!(synchronizer.notifications()[0].read);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_resets_counter_to_zero() {
        // テスト項目: mark_all_as_read は未読数を常に 0 にし、バックエンド停止は無視する
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        api.expect_mark_all_read()
            .times(1)
            .returning(|| Err(unavailable()));
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        for id in ["n1", "n2", "n3"] {
            harness
                .router
                .deliver(events::NEW_NOTIFICATION, &json!({"id": id}));
        }

        // when (操作):
        let result = synchronizer.mark_all_as_read().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(synchronizer.unread_count(), 0);
        assert!(synchronizer.notifications().iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn test_create_refetches_instead_of_appending() {
        // テスト項目: create の成功後はローカル追加ではなく一覧を再取得する
        // given (前提条件):
        let harness = TestHarness::new();
        let mut api = MockNotificationApi::new();
        api.expect_create().times(1).returning(|_| Ok(()));
        let listed = page(vec![notification("server-side", false)]);
        api.expect_list()
            .times(1)
            .returning(move || Ok(listed.clone()));
        let synchronizer = create_synchronizer(&harness, api, "buyer");
        let new_notification = NewNotification {
            recipient_id: None,
            kind: "message".to_string(),
            title: "hello".to_string(),
            message: "world".to_string(),
            link: None,
            metadata: Value::Null,
        };

        // when (操作):
        synchronizer.create(&new_notification).await.unwrap();

        // then (期待する結果):
        let notifications = synchronizer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].id.as_str(), "server-side");
    }

    #[test]
    fn test_pushed_notifications_are_prepended_without_dedup() {
        // テスト項目: プッシュ通知は先頭に追加され、同一通知でも重複排除されない
        // given (前提条件):
        let harness = TestHarness::new();
        let synchronizer = create_synchronizer(&harness, MockNotificationApi::new(), "buyer");
        let payload = json!({"id": "n1", "type": "message", "read": false});

        // when (操作):
        harness.router.deliver(events::NEW_NOTIFICATION, &payload);
        harness.router.deliver(events::NEW_NOTIFICATION, &payload);
        harness
            .router
            .deliver(events::NEW_NOTIFICATION, &json!({"id": "n2", "read": true}));

        // then (期待する結果):
        let snapshot = synchronizer.snapshot();
        assert_eq!(snapshot.unread_count, 2);
        assert_eq!(snapshot.notifications.len(), 3);
        assert_eq!(snapshot.notifications[0].id.as_str(), "n2");
    }

    #[test]
    fn test_announcements_are_filtered_by_audience() {
        // テスト項目: お知らせは all または自分のロール宛てのみ取り込まれる
        // given (前提条件):
        let harness = TestHarness::new();
        let synchronizer = create_synchronizer(&harness, MockNotificationApi::new(), "buyer");

        // when (操作):
        harness.router.deliver(
            events::NEW_ANNOUNCEMENT,
            &json!({"title": "Maintenance", "message": "tonight", "target": "all", "priority": "high"}),
        );
        harness.router.deliver(
            events::NEW_ANNOUNCEMENT,
            &json!({"title": "Sellers only", "message": "fees", "target": "seller"}),
        );

        // then (期待する結果):
        let notifications = synchronizer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "announcement");
        assert_eq!(notifications[0].title, "Maintenance");
        assert!(!notifications[0].read);
        assert_eq!(notifications[0].created_at, utc_from_millis(NOW_MILLIS));
        assert_eq!(notifications[0].metadata["priority"], "high");
        assert_eq!(synchronizer.unread_count(), 1);
    }
}
