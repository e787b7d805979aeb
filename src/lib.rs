//! Beacon
//!
//! Real-time notification delivery: a notification store, a per-user
//! broadcast hub, and server-sent event streams that replay the unread
//! backlog before switching to live delivery.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hub;
pub mod logger;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod server;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}
