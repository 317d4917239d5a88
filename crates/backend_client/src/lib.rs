//! Schedule backend HTTP client.
//!
//! Implements the engine's backend traits over the backend's REST API:
//! month data, save submission, notification fan-out, audit feed.
//!
//! No retries. A transient failure is reported and the caller decides.

mod client;

pub use client::{HttpBackend, IDEMPOTENCY_HEADER};
