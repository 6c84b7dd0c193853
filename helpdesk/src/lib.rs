//! Help Desk Mefasa client library
//!
//! Session handling, role-based access, saved ticket filters and the
//! resource services a dashboard front end binds to. The backend is the
//! only source of truth; everything here is a cache of its responses.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod forms;
pub mod models;
pub mod services;
pub mod storage;
