//! Storage module
//!
//! Local cache for downloaded binary data (avatars, attachments).

pub mod blob_store;

pub use blob_store::{BlobLease, BlobStore};
