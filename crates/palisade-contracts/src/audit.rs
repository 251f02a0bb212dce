//! Audit event contract.
//!
//! The audit channel is privacy-preserving by construction: an event carries
//! a coarse outcome, an HMAC fingerprint of the query *shape*, and a rounded
//! timing figure. No raw SQL, parameters, identifiers, row data, or schema
//! names are representable here — the struct has no fields to put them in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse outcome classes for query audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResultType {
    /// The query passed validation and allowlisting; backend contact follows.
    Validated,
    /// The query was rejected before any backend contact.
    Rejected,
    /// Backend execution succeeded.
    Success,
    /// Backend execution failed after validation had succeeded.
    ExecutionError,
}

/// One structured audit record. The field set is closed; additions are a
/// contract change, not a convenience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAuditEvent {
    pub timestamp: DateTime<Utc>,
    /// The adapter that handled (or rejected) the query.
    pub adapter: String,
    pub result_type: AuditResultType,
    /// HMAC-SHA256 over the normalized query shape, hex-encoded.
    pub query_fingerprint: String,
    /// Execution time rounded to the nearest 10 ms. Absent for events that
    /// precede execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl QueryAuditEvent {
    /// Build an event, rounding `execution_time_ms` to the nearest 10 ms so
    /// fine-grained timing cannot be used as a side channel.
    pub fn new(
        adapter: impl Into<String>,
        result_type: AuditResultType,
        query_fingerprint: impl Into<String>,
        execution_time_ms: Option<u64>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            adapter: adapter.into(),
            result_type,
            query_fingerprint: query_fingerprint.into(),
            execution_time_ms: execution_time_ms.map(round_to_10ms),
        }
    }
}

/// Round to the nearest multiple of 10, half away from zero.
pub fn round_to_10ms(ms: u64) -> u64 {
    (ms + 5) / 10 * 10
}
