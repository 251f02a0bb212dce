//! The in-memory reference adapter.
//!
//! Realizes the adapter contract over the memory driver and owns the full
//! SQL chain: validator → allowlist → safe-read executor → audit. The
//! ordering discipline matters and is covered by tests:
//!
//! - exactly one `validated` or `rejected` event precedes any backend
//!   contact
//! - at most one `success` / `execution_error` event follows
//! - a `validated` or `success` event that cannot be emitted fails the
//!   operation (`AUDIT_FAILURE`), and a post-success audit failure
//!   suppresses the result payload

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use palisade_audit::QueryFingerprinter;
use palisade_contracts::audit::{AuditResultType, QueryAuditEvent};
use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::{QualifiedTable, QueryMetadata, QueryOutcome, QueryRequest};
use palisade_contracts::tool::{HealthStatus, TableDescription, TableListing, TableRef};
use palisade_core::config::DatabaseSettings;
use palisade_core::session::SessionContext;
use palisade_core::traits::{Adapter, AuditSink};
use palisade_sql::{enforce_tables, Allowlist, OrderByPolicy, SqlValidator};

use crate::driver::Driver;
use crate::executor::SafeReadExecutor;
use crate::memory::{MemoryDataset, MemoryDriver};

const ADAPTER_NAME: &str = "memory";

/// The memory-backed adapter serving the three read operations.
pub struct MemoryAdapter {
    dataset: Arc<MemoryDataset>,
    allowlist: Arc<Allowlist>,
    validator: SqlValidator,
    order_by: Option<OrderByPolicy>,
    executor: SafeReadExecutor,
    fingerprinter: QueryFingerprinter,
    audit: Arc<dyn AuditSink>,
    connected: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(
        driver: Arc<MemoryDriver>,
        dataset: Arc<MemoryDataset>,
        allowlist: Arc<Allowlist>,
        order_by: Option<OrderByPolicy>,
        fingerprinter: QueryFingerprinter,
        audit: Arc<dyn AuditSink>,
        database: &DatabaseSettings,
    ) -> Self {
        let executor = SafeReadExecutor::new(
            driver as Arc<dyn Driver>,
            database.pool_size,
            Duration::from_millis(database.acquire_timeout_ms),
        );
        Self {
            dataset,
            allowlist,
            validator: SqlValidator::new(),
            order_by,
            executor,
            fingerprinter,
            audit,
            connected: AtomicBool::new(false),
        }
    }

    /// Emit an event the operation cannot proceed (or report success)
    /// without. A sink failure here is the caller's failure.
    fn emit_required(
        &self,
        result_type: AuditResultType,
        fingerprint: &str,
        execution_time_ms: Option<u64>,
    ) -> GatewayResult<()> {
        self.audit.emit(&QueryAuditEvent::new(
            ADAPTER_NAME,
            result_type,
            fingerprint,
            execution_time_ms,
        ))
    }

    /// Emit an event on a path that is already failing; the denial itself
    /// is the caller's answer, so a sink failure only gets logged.
    fn emit_best_effort(
        &self,
        result_type: AuditResultType,
        fingerprint: &str,
        execution_time_ms: Option<u64>,
    ) {
        if let Err(e) = self.emit_required(result_type, fingerprint, execution_time_ms) {
            warn!(error = %e, "audit emission failed on a denial path");
        }
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    fn connect(&self) -> GatewayResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!(adapter = ADAPTER_NAME, "adapter connected");
        Ok(())
    }

    fn disconnect(&self) -> GatewayResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!(adapter = ADAPTER_NAME, "adapter disconnected");
        Ok(())
    }

    fn health(&self) -> GatewayResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: self.connected.load(Ordering::SeqCst),
            adapter: ADAPTER_NAME.to_string(),
        })
    }

    fn list_tables(
        &self,
        schema: Option<&str>,
        ctx: &SessionContext,
    ) -> GatewayResult<TableListing> {
        ctx.assert_bound()?;

        if let Some(schema) = schema {
            if !self.allowlist.is_schema_allowed(schema) {
                return Err(GatewayError::UnauthorizedTable {
                    table: format!("{schema}.*"),
                });
            }
        }

        let tables: Vec<TableRef> = self
            .dataset
            .tables()
            .iter()
            .filter(|t| schema.map_or(true, |s| t.schema == s))
            .filter(|t| self.allowlist.is_table_allowed(&t.schema, &t.name))
            .map(|t| TableRef {
                schema: t.schema.clone(),
                name: t.name.clone(),
            })
            .collect();

        Ok(TableListing {
            count: tables.len(),
            tables,
        })
    }

    fn describe_table(
        &self,
        schema: &str,
        table: &str,
        ctx: &SessionContext,
    ) -> GatewayResult<TableDescription> {
        ctx.assert_bound()?;
        self.allowlist
            .enforce_table(&QualifiedTable::new(schema, table))?;

        let found = self
            .dataset
            .find(schema, table)
            .ok_or(GatewayError::ObjectNotFound)?;

        Ok(TableDescription {
            schema: found.schema.clone(),
            table: found.name.clone(),
            column_count: found.columns.len(),
            columns: found.columns.clone(),
        })
    }

    fn execute_query(
        &self,
        req: &QueryRequest,
        ctx: &SessionContext,
    ) -> GatewayResult<QueryOutcome> {
        // Defense in depth: the gateway already checked the session, but an
        // adapter must not trust its caller's discipline.
        ctx.assert_bound()?;

        let fingerprint = self.fingerprinter.fingerprint(&req.query);

        // ── C5: dialect validation ───────────────────────────────────────────
        let validated = match self.validator.validate(&req.query, self.order_by.as_ref()) {
            Ok(v) => v,
            Err(err) => {
                self.emit_best_effort(AuditResultType::Rejected, &fingerprint, None);
                return Err(err);
            }
        };

        // ── C6: table allowlist ──────────────────────────────────────────────
        if let Err(err) = enforce_tables(&validated.tables, &self.allowlist) {
            self.emit_best_effort(AuditResultType::Rejected, &fingerprint, None);
            return Err(err);
        }

        // ── C8 (pre): the validated event must land before backend contact ──
        self.emit_required(AuditResultType::Validated, &fingerprint, None)?;

        // ── C7: guarded execution ────────────────────────────────────────────
        match self
            .executor
            .execute(&validated, &req.params, req.limit, req.timeout_ms)
        {
            Ok(exec) => {
                // ── C8 (post): no success event, no result payload ───────────
                self.emit_required(
                    AuditResultType::Success,
                    &fingerprint,
                    Some(exec.execution_time_ms),
                )?;

                Ok(QueryOutcome {
                    rows: exec.rows,
                    row_count: exec.row_count,
                    fields: exec.fields,
                    metadata: QueryMetadata {
                        execution_time_ms: exec.execution_time_ms,
                        truncated: exec.truncated,
                        applied_limit: exec.applied_limit,
                        requested_limit: req.limit,
                    },
                })
            }
            Err(err) => {
                self.emit_best_effort(AuditResultType::ExecutionError, &fingerprint, None);
                Err(err)
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use palisade_audit::AuditSecret;
    use palisade_contracts::error::ErrorCode;
    use palisade_core::gateway::Gateway;
    use palisade_core::session::fresh_session_id;

    use crate::driver::DriverError;

    // ── Spy sink ─────────────────────────────────────────────────────────────

    struct SpySink {
        events: Mutex<Vec<QueryAuditEvent>>,
        fail_on: Mutex<Option<AuditResultType>>,
    }

    impl SpySink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(vec![]),
                fail_on: Mutex::new(None),
            })
        }

        fn fail_on(&self, result_type: AuditResultType) {
            *self.fail_on.lock().unwrap() = Some(result_type);
        }

        fn result_types(&self) -> Vec<AuditResultType> {
            self.events.lock().unwrap().iter().map(|e| e.result_type).collect()
        }

        fn fingerprints(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.query_fingerprint.clone())
                .collect()
        }
    }

    impl AuditSink for SpySink {
        fn emit(&self, event: &QueryAuditEvent) -> GatewayResult<()> {
            if *self.fail_on.lock().unwrap() == Some(event.result_type) {
                return Err(GatewayError::AuditFailure {
                    reason: "spy sink scripted failure".to_string(),
                });
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    // ── Harness ──────────────────────────────────────────────────────────────

    struct Harness {
        adapter: Arc<MemoryAdapter>,
        driver: Arc<MemoryDriver>,
        sink: Arc<SpySink>,
    }

    fn fingerprinter() -> QueryFingerprinter {
        QueryFingerprinter::new(
            AuditSecret::from_bytes(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
        )
    }

    fn harness_with(allowed_tables: &[&str], honor_limit: bool) -> Harness {
        let dataset = Arc::new(MemoryDataset::sample());
        let driver = if honor_limit {
            MemoryDriver::new(Arc::clone(&dataset))
        } else {
            MemoryDriver::ignoring_limit(Arc::clone(&dataset))
        };
        let sink = SpySink::new();
        let allowlist = Arc::new(Allowlist::new(
            vec!["public".to_string()],
            allowed_tables.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        ));
        let adapter = Arc::new(MemoryAdapter::new(
            Arc::clone(&driver),
            dataset,
            allowlist,
            Some(OrderByPolicy::new(vec![
                "public.users.created_at".to_string(),
            ])),
            fingerprinter(),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
            &DatabaseSettings::default(),
        ));
        Harness {
            adapter,
            driver,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(&[], true)
    }

    fn bound_session(h: &Harness) -> SessionContext {
        // Contexts are minted only by a gateway; build one over the same
        // adapter to obtain a properly branded session.
        let gateway =
            Gateway::new(Arc::clone(&h.adapter) as Arc<dyn Adapter>, vec![]).unwrap();
        let session = gateway.new_session();
        session.bind("agent-7", "acme", fresh_session_id()).unwrap();
        session
    }

    fn query(q: &str) -> QueryRequest {
        QueryRequest {
            query: q.to_string(),
            params: vec![],
            limit: None,
            timeout_ms: None,
        }
    }

    // ── Happy path (scenario S1) ─────────────────────────────────────────────

    #[test]
    fn happy_path_query_with_params_and_limit() {
        let h = harness();
        let ctx = bound_session(&h);

        let request = QueryRequest {
            query: "SELECT id, name FROM public.users WHERE id = $1".to_string(),
            params: vec![serde_json::json!(1)],
            limit: Some(10),
            timeout_ms: None,
        };
        let outcome = h.adapter.execute_query(&request, &ctx).unwrap();

        assert_eq!(outcome.metadata.applied_limit, 10);
        assert_eq!(outcome.metadata.requested_limit, Some(10));
        assert!(!outcome.metadata.truncated);
        assert!(outcome.row_count > 0);
        assert_eq!(
            h.sink.result_types(),
            vec![AuditResultType::Validated, AuditResultType::Success]
        );

        // Same statement with a different parameter value: identical
        // fingerprints across all four events.
        let second = QueryRequest {
            params: vec![serde_json::json!(2)],
            ..request
        };
        h.adapter.execute_query(&second, &ctx).unwrap();

        let fingerprints = h.sink.fingerprints();
        assert_eq!(fingerprints.len(), 4);
        assert!(fingerprints.iter().all(|f| f == &fingerprints[0]));
    }

    // ── Rejections (scenarios S2, S3, S6) ────────────────────────────────────

    #[test]
    fn multi_statement_rejected_before_any_backend_contact() {
        let h = harness();
        let ctx = bound_session(&h);

        let err = h
            .adapter
            .execute_query(&query("SELECT 1; DROP TABLE public.users"), &ctx)
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::QueryRejected);
        assert_eq!(h.sink.result_types(), vec![AuditResultType::Rejected]);
        assert_eq!(h.driver.query_count(), 0, "no connection was used");
    }

    #[test]
    fn unauthorized_table_rejected_by_the_allowlist() {
        let h = harness_with(&["public.users"], true);
        let ctx = bound_session(&h);

        let err = h
            .adapter
            .execute_query(&query("SELECT * FROM public.secrets"), &ctx)
            .unwrap_err();

        match err {
            GatewayError::UnauthorizedTable { table } => assert_eq!(table, "public.secrets"),
            other => panic!("expected UnauthorizedTable, got {:?}", other),
        }
        assert_eq!(h.sink.result_types(), vec![AuditResultType::Rejected]);
        assert_eq!(h.driver.query_count(), 0);
    }

    #[test]
    fn offset_rejected_as_a_dos_guard() {
        let h = harness();
        let ctx = bound_session(&h);

        let err = h
            .adapter
            .execute_query(
                &query("SELECT * FROM public.users LIMIT 10 OFFSET 1000000"),
                &ctx,
            )
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::QueryRejected);
        assert_eq!(h.driver.query_count(), 0);
    }

    // ── Audit ordering and fail-closed emission ──────────────────────────────

    #[test]
    fn validated_event_precedes_backend_contact() {
        let h = harness();
        let ctx = bound_session(&h);

        // If the validated event cannot be emitted, the backend must never
        // be touched.
        h.sink.fail_on(AuditResultType::Validated);
        let err = h
            .adapter
            .execute_query(&query("SELECT id FROM public.users"), &ctx)
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::AuditFailure);
        assert_eq!(h.driver.query_count(), 0);
    }

    #[test]
    fn post_success_audit_failure_suppresses_the_payload() {
        let h = harness();
        let ctx = bound_session(&h);

        h.sink.fail_on(AuditResultType::Success);
        let err = h
            .adapter
            .execute_query(&query("SELECT id FROM public.users"), &ctx)
            .unwrap_err();

        // The query ran, but the caller gets AUDIT_FAILURE and no rows.
        assert_eq!(err.code(), ErrorCode::AuditFailure);
        assert_eq!(h.driver.query_count(), 1);
        assert_eq!(h.sink.result_types(), vec![AuditResultType::Validated]);
    }

    #[test]
    fn execution_error_follows_a_validated_event_exactly_once() {
        let h = harness();
        let ctx = bound_session(&h);

        h.driver.inject_failure(DriverError::Timeout);
        let err = h
            .adapter
            .execute_query(&query("SELECT id FROM public.users"), &ctx)
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Timeout);
        assert_eq!(
            h.sink.result_types(),
            vec![AuditResultType::Validated, AuditResultType::ExecutionError]
        );
    }

    // ── Defensive session re-check ───────────────────────────────────────────

    #[test]
    fn unbound_context_is_refused_at_the_adapter_too() {
        let h = harness();
        let gateway =
            Gateway::new(Arc::clone(&h.adapter) as Arc<dyn Adapter>, vec![]).unwrap();
        let unbound = gateway.new_session();

        let err = h
            .adapter
            .execute_query(&query("SELECT id FROM public.users"), &unbound)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionContextInvalid);
        assert!(h.sink.result_types().is_empty());
        assert_eq!(h.driver.query_count(), 0);

        assert!(h.adapter.list_tables(None, &unbound).is_err());
        assert!(h.adapter.describe_table("public", "users", &unbound).is_err());
    }

    // ── Truncation through the full chain ────────────────────────────────────

    #[test]
    fn surplus_driver_rows_are_truncated_and_flagged() {
        let h = harness_with(&[], false); // driver ignores LIMIT
        let ctx = bound_session(&h);

        let request = QueryRequest {
            query: "SELECT id FROM public.users".to_string(),
            params: vec![],
            limit: Some(2),
            timeout_ms: None,
        };
        let outcome = h.adapter.execute_query(&request, &ctx).unwrap();

        assert_eq!(outcome.row_count, 2);
        assert!(outcome.metadata.truncated);
        assert_eq!(outcome.metadata.applied_limit, 2);
    }

    // ── ORDER BY through the full chain ──────────────────────────────────────

    #[test]
    fn order_by_respects_the_configured_sort_allowlist() {
        let h = harness();
        let ctx = bound_session(&h);

        h.adapter
            .execute_query(
                &query("SELECT id FROM public.users u ORDER BY u.created_at DESC"),
                &ctx,
            )
            .unwrap();

        let err = h
            .adapter
            .execute_query(
                &query("SELECT id FROM public.users u ORDER BY u.email"),
                &ctx,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::QueryRejected);
    }

    // ── Catalog operations ───────────────────────────────────────────────────

    #[test]
    fn list_tables_filters_by_allowlist_and_schema() {
        let h = harness_with(&["public.users", "public.orders"], true);
        let ctx = bound_session(&h);

        let listing = h.adapter.list_tables(None, &ctx).unwrap();
        let names: Vec<&str> = listing.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(listing.count, 2);
        assert!(names.contains(&"users"));
        assert!(names.contains(&"orders"));
        assert!(!names.contains(&"secrets"));

        let listing = h.adapter.list_tables(Some("public"), &ctx).unwrap();
        assert_eq!(listing.count, 2);

        let err = h.adapter.list_tables(Some("internal"), &ctx).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnauthorizedTable);
    }

    #[test]
    fn describe_table_enforces_the_allowlist() {
        let h = harness_with(&["public.users"], true);
        let ctx = bound_session(&h);

        let description = h.adapter.describe_table("public", "users", &ctx).unwrap();
        assert_eq!(description.column_count, 4);
        assert!(description.columns.iter().any(|c| c.is_primary_key));

        let err = h
            .adapter
            .describe_table("public", "secrets", &ctx)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnauthorizedTable);
    }

    #[test]
    fn describe_table_reports_missing_objects() {
        let h = harness();
        let ctx = bound_session(&h);

        let err = h
            .adapter
            .describe_table("public", "nonexistent", &ctx)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ObjectNotFound);
    }

    #[test]
    fn health_follows_the_connection_state() {
        let h = harness();

        assert!(!h.adapter.health().unwrap().healthy);
        h.adapter.connect().unwrap();
        assert!(h.adapter.health().unwrap().healthy);
        h.adapter.disconnect().unwrap();
        assert!(!h.adapter.health().unwrap().healthy);
    }
}
