//! Typed application events
//!
//! Components announce state changes on an [`EventBus`] and other
//! components subscribe to refresh themselves. Delivery is at most once
//! to receivers subscribed at send time; nothing is queued for later
//! subscribers.

use crate::models::ResourceKind;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Events broadcast between components
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// The previous session is gone and dependent caches must drop it
    SessionCleared,
    SessionEstablished { user_id: i64 },
    LoggedOut,
    ResourceChanged {
        kind: ResourceKind,
        change: ChangeKind,
        id: Option<i64>,
        /// Instance that made the change, so it can skip its own echo
        origin: Option<Uuid>,
    },
    FavoritesChanged { filter_id: i64, favorite: bool },
    NotificationRaised { message: String },
}

/// Fire-and-forget publish/subscribe channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Returns how many receivers got the event
    pub fn publish(&self, event: AppEvent) -> usize {
        tracing::debug!("Publishing event: {:?}", event);
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
