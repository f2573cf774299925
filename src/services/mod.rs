//! Services Module
//!
//! Request orchestration and background revalidation on top of the cache,
//! the durable store and the upstream provider.

mod lookup;
mod reconcile;

pub use lookup::{LookupService, Source};
pub use reconcile::{ReconcileOutcome, Reconciler};
