//! API Module
//!
//! HTTP handlers, WebSocket upgrades and routing for the college statistics
//! server.

pub mod handlers;
pub mod routes;
pub mod ws;

pub use handlers::*;
pub use routes::create_router;
