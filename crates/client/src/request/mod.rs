//! Request tracking and orchestration.
//!
//! The [`RequestService`] is the public entry point of the layer: it
//! deduplicates concurrent identical requests, issues the network call at
//! most once per unique (method, href) while callers are waiting, and
//! updates the object cache on success before notifying dependents.

mod models;
mod service;

pub use models::{RequestDescriptor, RequestEntry, RequestMethod, RequestState};
pub use service::{ConfiguredRequest, RequestService};
