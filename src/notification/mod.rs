//! In-app notification log.
//!
//! Entries are kept newest first. Apart from the read flag, an entry never
//! changes after it was added. Delivery of device push messages goes through
//! a [`PushTransport`] and is independent from the log.

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{IdGenerator, NotificationId, OrderId};
use crate::order::OrderStatus;

mod error;
pub use error::NotificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: Timestamp,
    pub read: bool,
    pub order_id: Option<OrderId>,
}

/// Input for [`NotificationLog::add_notification`]; id and timestamp are
/// filled in when missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewNotification {
    pub id: Option<NotificationId>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: Option<Timestamp>,
    pub order_id: Option<OrderId>,
}

impl NewNotification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            ..Self::default()
        }
    }
}

/// Content of a device push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushContent {
    pub title: String,
    pub body: String,
    pub order_id: Option<OrderId>,
}

/// Device push service, implemented by the host platform.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Register the device; `None` when the user refused push permission.
    async fn register(&self) -> Result<Option<String>, NotificationError>;

    /// Schedule a local push after `delay` (immediately when `None`).
    /// Returns the transport's id for the scheduled message.
    async fn schedule(
        &self,
        content: &PushContent,
        delay: Option<SignedDuration>,
    ) -> Result<String, NotificationError>;
}

/// Title and kind shown for an order status change.
pub fn order_status_title(status: OrderStatus) -> (&'static str, NotificationKind) {
    match status {
        OrderStatus::Confirmed => ("Order Confirmed", NotificationKind::Success),
        OrderStatus::Preparing => ("Order Being Prepared", NotificationKind::Info),
        OrderStatus::OutForDelivery => ("Out for Delivery", NotificationKind::Info),
        OrderStatus::Delivered => ("Order Delivered", NotificationKind::Success),
        OrderStatus::Cancelled => ("Order Cancelled", NotificationKind::Error),
        _ => ("Order Update", NotificationKind::Info),
    }
}

#[derive(Debug, Default)]
pub struct NotificationLog {
    /// Newest first
    entries: Vec<Notification>,
    push_token: Option<String>,
    ids: IdGenerator,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.entries
    }

    pub fn push_token(&self) -> Option<&str> {
        self.push_token.as_deref()
    }

    pub fn add_notification(&mut self, entry: NewNotification) -> Notification {
        let id = match entry.id {
            Some(id) => {
                self.ids.observe(id);
                id
            }
            None => self.ids.next_id(),
        };
        let notification = Notification {
            id,
            title: entry.title,
            message: entry.message,
            kind: entry.kind,
            timestamp: entry.timestamp.unwrap_or_else(Timestamp::now),
            read: false,
            order_id: entry.order_id,
        };
        info!(id, title = %notification.title, "notification added");
        self.entries.insert(0, notification.clone());
        notification
    }

    /// Returns whether an entry with this id exists.
    pub fn mark_as_read(&mut self, id: NotificationId) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_as_read(&mut self) {
        for entry in &mut self.entries {
            entry.read = true;
        }
    }

    pub fn remove_notification(&mut self, id: NotificationId) {
        self.entries.retain(|entry| entry.id != id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.read).count()
    }

    /// Log a status change of an order using the canonical title and kind.
    pub fn send_order_notification(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        message: Option<&str>,
    ) -> Notification {
        let (title, kind) = order_status_title(status);
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Order #{order_id} status updated."));

        self.add_notification(NewNotification {
            order_id: Some(order_id),
            ..NewNotification::new(title, message, kind)
        })
    }

    /// Register the device for push messages and remember its token.
    pub async fn register_for_push(
        &mut self,
        transport: &dyn PushTransport,
    ) -> Result<Option<&str>, NotificationError> {
        match transport.register().await? {
            Some(token) => {
                info!("push registration succeeded");
                self.push_token = Some(token);
            }
            None => info!("push permission not granted"),
        }
        Ok(self.push_token.as_deref())
    }

    pub async fn schedule_notification(
        &self,
        transport: &dyn PushTransport,
        content: &PushContent,
        delay: Option<SignedDuration>,
    ) -> Result<String, NotificationError> {
        transport.schedule(content, delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // test utils

    fn entry(title: &str) -> NewNotification {
        NewNotification::new(title, "body", NotificationKind::Info)
    }

    #[derive(Default)]
    struct FakePush {
        token: Option<String>,
        scheduled: Mutex<Vec<(PushContent, Option<SignedDuration>)>>,
    }

    #[async_trait]
    impl PushTransport for FakePush {
        async fn register(&self) -> Result<Option<String>, NotificationError> {
            Ok(self.token.clone())
        }

        async fn schedule(
            &self,
            content: &PushContent,
            delay: Option<SignedDuration>,
        ) -> Result<String, NotificationError> {
            let mut scheduled = self.scheduled.lock().unwrap();
            scheduled.push((content.clone(), delay));
            Ok(format!("push-{}", scheduled.len()))
        }
    }

    #[test]
    fn add_prepends_unread_entries() {
        let mut log = NotificationLog::new();
        let first = log.add_notification(entry("first"));
        let second = log.add_notification(entry("second"));

        assert!(second.id > first.id);
        assert_eq!(log.notifications()[0].title, "second");
        assert_eq!(log.unread_count(), 2);
        assert!(!first.read);
    }

    #[test]
    fn add_keeps_given_id_and_timestamp() {
        let mut log = NotificationLog::new();
        let at = Timestamp::from_second(1_705_345_200).unwrap();
        let stored = log.add_notification(NewNotification {
            id: Some(7),
            timestamp: Some(at),
            ..entry("fixed")
        });
        assert_eq!(stored.id, 7);
        assert_eq!(stored.timestamp, at);
    }

    #[test]
    fn mark_as_read_is_one_way() {
        let mut log = NotificationLog::new();
        let a = log.add_notification(entry("a"));
        log.add_notification(entry("b"));

        assert!(log.mark_as_read(a.id));
        assert!(log.mark_as_read(a.id));
        assert_eq!(log.unread_count(), 1);
        assert!(!log.mark_as_read(a.id + 1000));

        log.mark_all_as_read();
        assert_eq!(log.unread_count(), 0);
        log.mark_all_as_read();
        assert_eq!(log.unread_count(), 0);
    }

    #[test]
    fn remove_and_clear() {
        let mut log = NotificationLog::new();
        let a = log.add_notification(entry("a"));
        log.add_notification(entry("b"));

        log.remove_notification(a.id);
        assert_eq!(log.notifications().len(), 1);
        assert_eq!(log.notifications()[0].title, "b");

        log.clear_all();
        assert!(log.notifications().is_empty());
        assert_eq!(log.unread_count(), 0);
    }

    #[test]
    fn order_notifications_use_status_table() {
        let cases = [
            (OrderStatus::Confirmed, "Order Confirmed", NotificationKind::Success),
            (OrderStatus::Preparing, "Order Being Prepared", NotificationKind::Info),
            (OrderStatus::OutForDelivery, "Out for Delivery", NotificationKind::Info),
            (OrderStatus::Delivered, "Order Delivered", NotificationKind::Success),
            (OrderStatus::Cancelled, "Order Cancelled", NotificationKind::Error),
            (OrderStatus::Pending, "Order Update", NotificationKind::Info),
            (OrderStatus::ReadyForPickup, "Order Update", NotificationKind::Info),
        ];

        let mut log = NotificationLog::new();
        for (status, title, kind) in cases {
            let sent = log.send_order_notification(42, status, None);
            assert_eq!(sent.title, title);
            assert_eq!(sent.kind, kind);
            assert_eq!(sent.order_id, Some(42));
            assert_eq!(sent.message, "Order #42 status updated.");
        }
    }

    #[test]
    fn order_notification_custom_message() {
        let mut log = NotificationLog::new();
        let sent = log.send_order_notification(1, OrderStatus::Delivered, Some("Enjoy!"));
        assert_eq!(sent.message, "Enjoy!");
    }

    #[tokio::test]
    async fn register_for_push_stores_token() {
        let mut log = NotificationLog::new();
        let push = FakePush {
            token: Some("device-token".into()),
            ..FakePush::default()
        };

        let token = log.register_for_push(&push).await.unwrap();
        assert_eq!(token, Some("device-token"));
        assert_eq!(log.push_token(), Some("device-token"));
    }

    #[tokio::test]
    async fn register_without_permission_keeps_no_token() {
        let mut log = NotificationLog::new();
        let token = log.register_for_push(&FakePush::default()).await.unwrap();
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn schedule_delegates_to_transport() {
        let log = NotificationLog::new();
        let push = FakePush::default();
        let content = PushContent {
            title: "Order Delivered".into(),
            body: "Enjoy your meal".into(),
            order_id: Some(3),
        };

        let id = log
            .schedule_notification(&push, &content, Some(SignedDuration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(id, "push-1");
        assert_eq!(push.scheduled.lock().unwrap()[0].0, content);
        // the log itself is untouched
        assert!(log.notifications().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_keeps_previous_token() {
        struct Offline;

        #[async_trait]
        impl PushTransport for Offline {
            async fn register(&self) -> Result<Option<String>, NotificationError> {
                Err(NotificationError::Transport("offline".into()))
            }

            async fn schedule(
                &self,
                _content: &PushContent,
                _delay: Option<SignedDuration>,
            ) -> Result<String, NotificationError> {
                Err(NotificationError::Transport("offline".into()))
            }
        }

        let mut log = NotificationLog::new();
        log.register_for_push(&FakePush {
            token: Some("old-token".into()),
            ..FakePush::default()
        })
        .await
        .unwrap();

        let result = log.register_for_push(&Offline).await;
        assert_eq!(result, Err(NotificationError::Transport("offline".into())));
        assert_eq!(log.push_token(), Some("old-token"));
    }
}
