//! Data models
//!
//! Plain records mirrored from the backend API. The client holds no
//! authoritative state; every entity arrives in a response and is
//! replaced wholesale by the next fetch.

pub mod catalog;
pub mod dashboard;
pub mod filter;
pub mod ticket;
pub mod user;

pub use catalog::*;
pub use dashboard::*;
pub use filter::*;
pub use ticket::*;
pub use user::*;

use crate::forms::ValidationErrors;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend collections the client manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tickets,
    Users,
    Roles,
    Permissions,
    Floors,
    Areas,
    Filters,
}

impl ResourceKind {
    /// Path segment of the collection under the API base URL
    pub fn collection(self) -> &'static str {
        match self {
            ResourceKind::Tickets => "tickets",
            ResourceKind::Users => "users",
            ResourceKind::Roles => "roles",
            ResourceKind::Permissions => "permissions",
            ResourceKind::Floors => "floors",
            ResourceKind::Areas => "areas",
            ResourceKind::Filters => "filters",
        }
    }

    /// Singular noun used in user-facing messages
    pub fn singular(self) -> &'static str {
        match self {
            ResourceKind::Tickets => "ticket",
            ResourceKind::Users => "user",
            ResourceKind::Roles => "role",
            ResourceKind::Permissions => "permission",
            ResourceKind::Floors => "floor",
            ResourceKind::Areas => "area",
            ResourceKind::Filters => "filter",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// An entity stored in one backend collection
///
/// `Draft` is the create/update payload; `validate` runs once at
/// submission, before anything is sent.
pub trait Resource: Clone + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;

    type Draft: Serialize + Send + Sync;

    fn id(&self) -> i64;

    fn validate(draft: &Self::Draft) -> Result<(), ValidationErrors>;
}
