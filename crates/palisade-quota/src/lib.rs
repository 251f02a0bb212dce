//! # palisade-quota
//!
//! The in-memory quota engine: token buckets for rate and cost, counted
//! semaphores for concurrency, all keyed by the granularity of the matched
//! policy rather than the request. Implements the `QuotaGate` seam from
//! `palisade-core`. Per-process only — multi-node coordination is out of
//! scope by contract.

mod bucket;
mod semaphore;

pub mod engine;
pub mod policy;

pub use engine::{QuotaEngine, QuotaEngineConfig};
pub use policy::{resolve_policy, scope_key};
