//! Live Update Module
//!
//! Push channel for connected WebSocket clients: the subscriber registry
//! that fans events out per partition, and the per-connection session.

mod registry;
mod session;

pub use registry::{ConnectionId, Partition, Subscriber, SubscriberRegistry};
pub use session::{Session, SessionConfig, SessionHandle, SessionState};
