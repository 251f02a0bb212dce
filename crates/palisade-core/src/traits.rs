//! Core trait definitions for the PALISADE pipeline.
//!
//! These three traits define the trust boundary around the gateway:
//!
//! - `Adapter`   — the only door to a backend database
//! - `AuditSink` — trusted sink for the privacy-preserving query events
//! - `QuotaGate` — trusted reservation of rate/cost/concurrency capacity
//!
//! The gateway wires them together in the canonical order. No `Adapter`
//! method is ever reached unless the session, registry, read-only,
//! authorization, quota, and input-schema gates have all passed first.

use palisade_contracts::audit::QueryAuditEvent;
use palisade_contracts::error::GatewayResult;
use palisade_contracts::query::{QueryOutcome, QueryRequest};
use palisade_contracts::quota::{QuotaDecision, QuotaRequest};
use palisade_contracts::tool::{HealthStatus, TableDescription, TableListing};

use crate::session::SessionContext;

/// A per-database realization of the three read operations.
///
/// Implementations are the last trusted hop before the wire driver. They
/// must re-assert the session contract at entry (defense in depth — the
/// gateway already checked it) and route every piece of SQL through the
/// validator → allowlist → safe-read executor → audit chain. Adapters
/// receive parameterized inputs only; the single permitted query rewrite is
/// the server-side row-cap injection on an already-validated query.
pub trait Adapter: Send + Sync {
    /// Stable adapter name, recorded in audit events.
    fn name(&self) -> &str;

    /// Establish backend connectivity. Called once at startup.
    fn connect(&self) -> GatewayResult<()>;

    /// Tear down backend connectivity.
    fn disconnect(&self) -> GatewayResult<()>;

    /// Cheap liveness probe for supervisors.
    fn health(&self) -> GatewayResult<HealthStatus>;

    /// Enumerate visible tables, optionally narrowed to one schema.
    ///
    /// A requested schema outside the allowlist is an
    /// `UNAUTHORIZED_TABLE`-class failure, not an empty listing.
    fn list_tables(
        &self,
        schema: Option<&str>,
        ctx: &SessionContext,
    ) -> GatewayResult<TableListing>;

    /// Describe one allowlisted table's columns.
    fn describe_table(
        &self,
        schema: &str,
        table: &str,
        ctx: &SessionContext,
    ) -> GatewayResult<TableDescription>;

    /// Validate and execute one read-only query.
    fn execute_query(
        &self,
        req: &QueryRequest,
        ctx: &SessionContext,
    ) -> GatewayResult<QueryOutcome>;
}

/// The audit event sink.
///
/// Emission is fail-closed: when `emit` errors, the operation that produced
/// the event must be surfaced as failed, even if the database work already
/// succeeded. Implementations must not block handlers beyond their own
/// flush.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &QueryAuditEvent) -> GatewayResult<()>;
}

/// The quota reservation seam.
///
/// `check_and_reserve` either admits the request (possibly holding a
/// concurrency slot named by `semaphore_key`) or denies it with a reason.
/// Every reserved slot must be handed back through `release` on every exit
/// path, success or failure.
pub trait QuotaGate: Send + Sync {
    fn check_and_reserve(&self, req: &QuotaRequest) -> QuotaDecision;

    fn release(&self, semaphore_key: &str);
}
