//! Services module
//!
//! Business logic that coordinates between the UI layer, the API client
//! and the event bus.

pub mod attachments;
pub mod dashboard;
pub mod filters;
pub mod notifications;
pub mod resource;
pub mod settings;
pub mod tickets;

pub use attachments::{AttachmentsService, BlobSlot};
pub use dashboard::{AutoRefresh, DashboardService};
pub use filters::{FavoriteFilters, FilterComposer};
pub use notifications::{Notification, NotificationCenter, NotificationLevel};
pub use resource::{ResourceService, ResourceState};
pub use settings::{AppSettings, DashboardSettings, SettingsService};
pub use tickets::{TicketDetail, TicketsService};

use tokio::task::JoinHandle;

/// Background task owned by a scope; aborted when the guard drops
pub struct TaskGuard {
    handle: JoinHandle<()>,
}

impl TaskGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
