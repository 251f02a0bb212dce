//! The safe-read executor.
//!
//! Takes an already-validated query and runs it under the full set of
//! backend-side guards:
//!
//! 1. Clamp the caller's row cap to [1, 1000] (default 100) and timeout to
//!    [1000, 60000] ms (default 30 000).
//! 2. Rewrite the statement to carry a server-enforced row cap — append or
//!    clamp `LIMIT`, inject or clamp `TOP`, never touching any other token.
//! 3. Pooled connection, read-only transaction, statement timeout.
//! 4. Execute with positionally bound parameters.
//! 5. Roll back unconditionally — the transaction never commits, on any
//!    path — and return the connection to the pool.
//! 6. Post-truncate rows to the cap and flag `truncated` when the driver
//!    returned more.

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::{FieldInfo, ValidatedQuery};

use crate::driver::{Driver, DriverError, LimitDialect};
use crate::pool::ConnectionPool;

pub const MIN_ROW_CAP: u64 = 1;
pub const MAX_ROW_CAP: u64 = 1_000;
pub const DEFAULT_ROW_CAP: u64 = 100;

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// What one guarded read produced.
#[derive(Debug, Clone)]
pub struct ReadExecution {
    pub rows: Vec<serde_json::Value>,
    pub fields: Vec<FieldInfo>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub truncated: bool,
    pub applied_limit: u64,
}

pub struct SafeReadExecutor {
    pool: ConnectionPool,
    dialect: LimitDialect,
    trailing_limit: Regex,
    leading_top: Regex,
    select_head: Regex,
}

impl SafeReadExecutor {
    pub fn new(driver: Arc<dyn Driver>, pool_size: usize, acquire_timeout: Duration) -> Self {
        let dialect = driver.dialect();
        Self {
            pool: ConnectionPool::new(driver, pool_size, acquire_timeout),
            dialect,
            trailing_limit: Regex::new(r"(?i)\bLIMIT\s+(\d+)\s*$").expect("static regex"),
            leading_top: Regex::new(r"(?i)^SELECT(?:\s+DISTINCT)?\s+TOP\s+(\d+)")
                .expect("static regex"),
            select_head: Regex::new(r"(?i)^SELECT(?:\s+DISTINCT)?\s+").expect("static regex"),
        }
    }

    /// Rewrite `query` so the backend itself enforces `cap` rows. An
    /// existing cap is clamped to `min(existing, cap)`; nothing else in the
    /// statement changes.
    pub(crate) fn rewrite_with_cap(&self, query: &str, cap: u64) -> String {
        match self.dialect {
            LimitDialect::TrailingLimit => {
                if let Some(caps) = self.trailing_limit.captures(query) {
                    let existing = caps
                        .get(1)
                        .and_then(|m| m.as_str().parse::<u64>().ok())
                        .unwrap_or(u64::MAX);
                    let whole = caps.get(0).map(|m| m.start()).unwrap_or(query.len());
                    format!("{}LIMIT {}", &query[..whole], existing.min(cap))
                } else {
                    format!("{query} LIMIT {cap}")
                }
            }
            LimitDialect::LeadingTop => {
                if let Some(caps) = self.leading_top.captures(query) {
                    let existing = caps
                        .get(1)
                        .and_then(|m| m.as_str().parse::<u64>().ok())
                        .unwrap_or(u64::MAX);
                    let digits = caps.get(1).map(|m| m.range()).unwrap_or(0..0);
                    format!(
                        "{}{}{}",
                        &query[..digits.start],
                        existing.min(cap),
                        &query[digits.end..]
                    )
                } else if let Some(head) = self.select_head.find(query) {
                    format!("{}TOP {} {}", head.as_str(), cap, &query[head.end()..])
                } else {
                    // Unreachable for validated queries; leave untouched
                    // rather than guess.
                    query.to_string()
                }
            }
        }
    }

    /// Run `validated` under the full guard set.
    pub fn execute(
        &self,
        validated: &ValidatedQuery,
        params: &[serde_json::Value],
        limit: Option<u64>,
        timeout_ms: Option<u64>,
    ) -> GatewayResult<ReadExecution> {
        let applied_limit = limit
            .unwrap_or(DEFAULT_ROW_CAP)
            .clamp(MIN_ROW_CAP, MAX_ROW_CAP);
        let timeout = Duration::from_millis(
            timeout_ms
                .unwrap_or(DEFAULT_TIMEOUT_MS)
                .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
        );

        let sql = self.rewrite_with_cap(&validated.query, applied_limit);
        debug!(applied_limit, timeout_ms = timeout.as_millis() as u64, "executing guarded read");

        let started = Instant::now();
        let mut pooled = self.pool.acquire()?;
        let conn = pooled.as_mut();

        let result = (|| {
            conn.begin_read_only()?;
            conn.set_statement_timeout(timeout)?;
            conn.query(&sql, params)
        })();

        // The transaction never commits: reads have nothing to commit and
        // failures must leave no open transaction behind. Rollback errors
        // are logged; the connection still returns to the pool.
        if let Err(e) = conn.rollback() {
            warn!(error = %e, "rollback after guarded read failed");
        }
        drop(pooled);

        let execution_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(raw) => {
                let mut rows = raw.rows;
                let truncated = rows.len() as u64 > applied_limit;
                rows.truncate(applied_limit as usize);
                let row_count = rows.len();
                Ok(ReadExecution {
                    rows,
                    fields: raw.fields,
                    row_count,
                    execution_time_ms,
                    truncated,
                    applied_limit,
                })
            }
            Err(e) => Err(map_driver_error(e)),
        }
    }
}

/// Map driver failure kinds onto the closed wire set. Free-text driver
/// detail stops here, in the logs.
fn map_driver_error(e: DriverError) -> GatewayError {
    match e {
        DriverError::Timeout => GatewayError::Timeout,
        DriverError::Syntax => GatewayError::SyntaxError,
        DriverError::UnknownObject => GatewayError::ObjectNotFound,
        DriverError::ConnectionLost => GatewayError::ConnectionFailed {
            reason: "backend connection lost during execution".to_string(),
        },
        DriverError::Other(detail) => {
            warn!(%detail, "backend execution failed");
            GatewayError::ExecutionError
        }
    }
}
