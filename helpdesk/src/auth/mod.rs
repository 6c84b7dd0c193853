//! Authentication and authorization
//!
//! - `role`: role evaluator and access decisions
//! - `guard`: route table and navigation decisions
//! - `storage`: durable session storage backends
//! - `session`: the session store (who is logged in)
//! - `callback`: external identity provider redirect handling

pub mod callback;
pub mod guard;
pub mod role;
pub mod session;
pub mod storage;

pub use callback::{CallbackOutcome, CallbackParams};
pub use guard::{guard, Route, RouteDecision};
pub use role::{has_role, AccessDecision, RoleKey, RoleRequirement};
pub use session::{SessionState, SessionStore};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};
