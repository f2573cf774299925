//! College Stats - statistics server for colleges and universities
//!
//! Serves college records from a TTL cache backed by a durable store,
//! revalidates them in the background against an upstream provider, and
//! pushes changes to live WebSocket subscribers.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod services;
pub mod store;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::spawn_sweep_task;
