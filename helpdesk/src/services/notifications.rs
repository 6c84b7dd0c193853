//! Notifications service
//!
//! Transient, dismissible messages shown to the user. Every failed
//! mutation lands here exactly once. The list is bounded: past
//! `MAX_NOTIFICATIONS` the oldest entries go, and anything older than
//! `NOTIFICATION_TTL_SECS` is dropped on the next push or read.

use crate::config::{MAX_NOTIFICATIONS, NOTIFICATION_TTL_SECS};
use crate::events::{AppEvent, EventBus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Currently visible notifications
#[derive(Clone)]
pub struct NotificationCenter {
    items: Arc<Mutex<Vec<Notification>>>,
    events: Option<EventBus>,
    capacity: usize,
    ttl: Duration,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            events: None,
            capacity: MAX_NOTIFICATIONS,
            ttl: Duration::seconds(NOTIFICATION_TTL_SECS),
        }
    }

    /// Also announce every notification on the event bus
    pub fn with_events(events: EventBus) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    /// Keep at most `capacity` notifications (at least one)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lock the list with expired entries already removed
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        let mut items = match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cutoff = Utc::now() - self.ttl;
        items.retain(|n| n.created_at > cutoff);
        items
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = notification.id;

        if level == NotificationLevel::Error {
            tracing::warn!("Notifying user: {}", notification.message);
        }

        if let Some(events) = &self.events {
            events.publish(AppEvent::NotificationRaised {
                message: notification.message.clone(),
            });
        }

        let mut items = self.lock();
        items.push(notification);
        if items.len() > self.capacity {
            let excess = items.len() - self.capacity;
            items.drain(..excess);
        }
        id
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationLevel::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationLevel::Info, message)
    }

    /// Returns whether the notification was still showing
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    pub fn list(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let center = NotificationCenter::new();
        let first = center.error("Could not save ticket");
        center.info("Saved");

        assert_eq!(center.len(), 2);
        assert!(center.dismiss(first));
        assert!(!center.dismiss(first));

        let remaining = center.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].level, NotificationLevel::Info);
    }

    #[tokio::test]
    async fn test_notifications_announced_on_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let center = NotificationCenter::with_events(bus);

        center.error("boom");

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::NotificationRaised {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_oldest_dropped_past_capacity() {
        let center = NotificationCenter::new().with_capacity(3);

        for i in 0..5 {
            center.error(format!("failure {}", i));
        }

        let messages: Vec<_> = center.list().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["failure 2", "failure 3", "failure 4"]);
    }

    #[test]
    fn test_default_capacity_bounds_list() {
        let center = NotificationCenter::new();

        for _ in 0..(MAX_NOTIFICATIONS + 10) {
            center.error("Could not save ticket");
        }

        assert_eq!(center.len(), MAX_NOTIFICATIONS);
    }

    #[test]
    fn test_expired_notifications_hidden() {
        let center = NotificationCenter::new().with_ttl(Duration::zero());
        center.error("gone immediately");
        assert!(center.is_empty());

        let center = NotificationCenter::new();
        center.error("still here");
        assert_eq!(center.len(), 1);
    }
}
