//! The keyed quota engine.
//!
//! One engine instance serves the whole process. State is four keyed maps
//! (two rate buckets, a cost bucket, a concurrency semaphore) plus a
//! last-access map, all scoped by [`scope_key`](crate::policy::scope_key)
//! and bounded by `max_keys` with TTL eviction under insertion pressure.
//!
//! Evaluation order per request: resolve the single applicable policy →
//! derive the scope key → rate per minute → rate per 10 s → cost per minute
//! → concurrency. Consumption happens dimension by dimension; a request
//! denied on a later dimension has already spent its earlier tokens for the
//! window, which is the fail-closed direction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use palisade_contracts::quota::{
    QuotaDecision, QuotaDenyReason, QuotaDimension, QuotaPolicy, QuotaRequest,
};
use palisade_core::traits::QuotaGate;

use crate::bucket::TokenBucket;
use crate::policy::{resolve_policy, scope_key};
use crate::semaphore::CountingSemaphore;

const MINUTE: Duration = Duration::from_secs(60);
const TEN_SECONDS: Duration = Duration::from_secs(10);

/// Invocation cost units consumed from `cost.per_minute` buckets.
fn tool_cost(tool: &str) -> u64 {
    match tool {
        "list_tables" => 1,
        "describe_table" => 2,
        "query_read" => 5,
        _ => 1,
    }
}

/// Engine bounds. Defaults match the deployment contract: 10 000 scope keys,
/// one hour of idleness before a key is evictable.
#[derive(Debug, Clone)]
pub struct QuotaEngineConfig {
    pub max_keys: usize,
    pub idle_ttl: Duration,
}

impl Default for QuotaEngineConfig {
    fn default() -> Self {
        Self {
            max_keys: 10_000,
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EngineState {
    minute: HashMap<String, TokenBucket>,
    burst: HashMap<String, TokenBucket>,
    cost: HashMap<String, TokenBucket>,
    concurrency: HashMap<String, CountingSemaphore>,
    last_access: HashMap<String, Instant>,
}

impl EngineState {
    /// Record an access to `key`, evicting stale keys when the table is at
    /// capacity. A table that stays full even after eviction denies.
    fn admit(
        &mut self,
        key: &str,
        now: Instant,
        config: &QuotaEngineConfig,
    ) -> Result<(), QuotaDenyReason> {
        if !self.last_access.contains_key(key) && self.last_access.len() >= config.max_keys {
            let stale: Vec<String> = self
                .last_access
                .iter()
                .filter(|(_, touched)| {
                    now.checked_duration_since(**touched)
                        .map(|idle| idle >= config.idle_ttl)
                        .unwrap_or(false)
                })
                .map(|(k, _)| k.clone())
                .collect();

            for k in &stale {
                self.last_access.remove(k);
                self.minute.remove(k);
                self.burst.remove(k);
                self.cost.remove(k);
                self.concurrency.remove(k);
            }

            if self.last_access.len() >= config.max_keys {
                warn!(max_keys = config.max_keys, "quota key table exhausted");
                return Err(QuotaDenyReason::CounterError);
            }
        }
        self.last_access.insert(key.to_string(), now);
        Ok(())
    }
}

// ── Public engine ─────────────────────────────────────────────────────────────

/// Process-wide quota state. Policies are fixed at construction; counters
/// live behind one mutex with short critical sections.
pub struct QuotaEngine {
    policies: Vec<QuotaPolicy>,
    config: QuotaEngineConfig,
    state: Mutex<EngineState>,
}

impl QuotaEngine {
    pub fn new(policies: Vec<QuotaPolicy>, config: QuotaEngineConfig) -> Self {
        Self {
            policies,
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    fn check_bucket(
        bucket_map: &mut HashMap<String, TokenBucket>,
        key: &str,
        limit: u64,
        window: Duration,
        cost: u64,
        now: Instant,
        dimension: QuotaDimension,
    ) -> Result<(), QuotaDenyReason> {
        let bucket = bucket_map
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(limit, window, now));

        match bucket.try_consume(cost, now) {
            Ok(true) => Ok(()),
            Ok(false) => Err(QuotaDenyReason::LimitExceeded(dimension)),
            Err(_) => Err(QuotaDenyReason::CounterError),
        }
    }
}

impl QuotaGate for QuotaEngine {
    /// Resolve the policy, then walk the configured dimensions in order.
    ///
    /// On success, the returned `semaphore_key` (when concurrency is
    /// configured) must be handed back through [`QuotaGate::release`] on
    /// every exit path.
    fn check_and_reserve(&self, req: &QuotaRequest) -> QuotaDecision {
        let policy = match resolve_policy(&self.policies, req) {
            Ok(p) => p,
            Err(reason) => {
                warn!(tenant = %req.tenant, %reason, "quota policy resolution failed");
                return QuotaDecision::Denied { reason };
            }
        };

        let key = scope_key(policy, req);
        let now = Instant::now();
        let mut state = self.state.lock().expect("quota state lock poisoned");

        if let Err(reason) = state.admit(&key, now, &self.config) {
            return QuotaDecision::Denied { reason };
        }

        if let Some(limit) = policy.limit(QuotaDimension::RatePerMinute) {
            if let Err(reason) = Self::check_bucket(
                &mut state.minute,
                &key,
                limit,
                MINUTE,
                1,
                now,
                QuotaDimension::RatePerMinute,
            ) {
                debug!(scope = %key, %reason, "quota denied");
                return QuotaDecision::Denied { reason };
            }
        }

        if let Some(limit) = policy.limit(QuotaDimension::RatePer10Seconds) {
            if let Err(reason) = Self::check_bucket(
                &mut state.burst,
                &key,
                limit,
                TEN_SECONDS,
                1,
                now,
                QuotaDimension::RatePer10Seconds,
            ) {
                debug!(scope = %key, %reason, "quota denied");
                return QuotaDecision::Denied { reason };
            }
        }

        if let Some(limit) = policy.limit(QuotaDimension::CostPerMinute) {
            if let Err(reason) = Self::check_bucket(
                &mut state.cost,
                &key,
                limit,
                MINUTE,
                tool_cost(&req.tool),
                now,
                QuotaDimension::CostPerMinute,
            ) {
                debug!(scope = %key, %reason, "quota denied");
                return QuotaDecision::Denied { reason };
            }
        }

        if let Some(max) = policy.limit(QuotaDimension::ConcurrencyMax) {
            let sem = state
                .concurrency
                .entry(key.clone())
                .or_insert_with(|| CountingSemaphore::new(max));
            if !sem.try_acquire() {
                debug!(scope = %key, "quota denied: concurrency exhausted");
                return QuotaDecision::Denied {
                    reason: QuotaDenyReason::LimitExceeded(QuotaDimension::ConcurrencyMax),
                };
            }
            return QuotaDecision::Allowed {
                semaphore_key: Some(key),
            };
        }

        QuotaDecision::Allowed {
            semaphore_key: None,
        }
    }

    fn release(&self, semaphore_key: &str) {
        let mut state = self.state.lock().expect("quota state lock poisoned");
        state
            .last_access
            .insert(semaphore_key.to_string(), Instant::now());
        match state.concurrency.get_mut(semaphore_key) {
            Some(sem) => sem.release(),
            None => warn!(scope = %semaphore_key, "release for unknown semaphore key"),
        }
    }
}
