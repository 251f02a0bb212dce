//! Quota policy types and the matching predicate.
//!
//! Policies are loaded once at startup from a JSON array supplied by the
//! launcher. The engine (palisade-quota) consumes them; this module only
//! defines the declarative shapes, following the contracts crate rule of
//! holding no business logic beyond match predicates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The closed set of quota dimensions a policy may limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuotaDimension {
    /// Invocations per 60-second window.
    #[serde(rename = "rate.per_minute")]
    RatePerMinute,
    /// Invocations per 10-second window.
    #[serde(rename = "rate.per_10_seconds")]
    RatePer10Seconds,
    /// Maximum simultaneous in-flight invocations.
    #[serde(rename = "concurrency.max")]
    ConcurrencyMax,
    /// Cost units per 60-second window.
    #[serde(rename = "cost.per_minute")]
    CostPerMinute,
}

/// A single quota policy row.
///
/// `tenant` is mandatory; `identity` and `cap_set_id` are optional selectors.
/// A null selector both widens the match and coarsens the counter scope — the
/// engine derives its bucket keys from the *policy's* granularity, never from
/// the request, so rotating credentials cannot mint fresh buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub tenant: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default, alias = "capSetId")]
    pub cap_set_id: Option<String>,
    /// Configured limits, keyed by dimension. Dimensions absent from the map
    /// are unlimited under this policy.
    pub limits: BTreeMap<QuotaDimension, u64>,
}

impl QuotaPolicy {
    /// Return true when this policy applies to the request: the tenant
    /// matches and each non-null selector matches.
    pub fn applies(&self, req: &QuotaRequest) -> bool {
        if self.tenant != req.tenant {
            return false;
        }
        if let Some(identity) = &self.identity {
            if identity != &req.identity {
                return false;
            }
        }
        if let Some(cap_set_id) = &self.cap_set_id {
            if Some(cap_set_id.as_str()) != req.cap_set_id.as_deref() {
                return false;
            }
        }
        true
    }

    /// The limit configured for `dimension`, if any.
    pub fn limit(&self, dimension: QuotaDimension) -> Option<u64> {
        self.limits.get(&dimension).copied()
    }
}

/// The request-side facts the quota engine matches policies against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRequest {
    pub tenant: String,
    pub identity: String,
    /// Absent when no capability set is attached to the session.
    pub cap_set_id: Option<String>,
    /// The tool being invoked; drives cost-bucket consumption.
    pub tool: String,
}

impl QuotaDimension {
    /// The wire spelling, matching the policy JSON keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaDimension::RatePerMinute => "rate.per_minute",
            QuotaDimension::RatePer10Seconds => "rate.per_10_seconds",
            QuotaDimension::ConcurrencyMax => "concurrency.max",
            QuotaDimension::CostPerMinute => "cost.per_minute",
        }
    }
}

impl std::fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the quota engine refused a reservation.
///
/// All variants surface to the caller as `RATE_LIMITED`; the distinction
/// exists for logs and tests. Missing or ambiguous policy resolution denies
/// fail-closed rather than guessing a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDenyReason {
    /// No policy applies to the request.
    PolicyMissing,
    /// More than one policy applies; scope derivation would be a guess.
    PolicyAmbiguous,
    /// A configured limit had no remaining capacity.
    LimitExceeded(QuotaDimension),
    /// Internal counter state is unusable (clock regression, key-table
    /// exhaustion).
    CounterError,
}

impl std::fmt::Display for QuotaDenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaDenyReason::PolicyMissing => f.write_str("POLICY_MISSING"),
            QuotaDenyReason::PolicyAmbiguous => f.write_str("POLICY_AMBIGUOUS"),
            QuotaDenyReason::LimitExceeded(dim) => write!(f, "LIMIT_EXCEEDED:{dim}"),
            QuotaDenyReason::CounterError => f.write_str("COUNTER_ERROR"),
        }
    }
}

/// The outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Proceed. When a concurrency slot was taken, `semaphore_key` names it
    /// and the caller must release it on every exit path.
    Allowed { semaphore_key: Option<String> },
    /// Refuse with `RATE_LIMITED`.
    Denied { reason: QuotaDenyReason },
}
