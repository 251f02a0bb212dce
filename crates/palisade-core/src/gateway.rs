//! The execution boundary: every tool invocation passes through here.
//!
//! The gateway owns the registry, the adapter, and the trust wiring, and
//! enforces the canonical pipeline on every call to `invoke()`:
//!
//!   Session → Registry → Read-only gate → Authorization → Quota →
//!   Input schema → Handler → (always) quota release
//!
//! The security invariant is absolute: steps 1–5 perform no adapter calls,
//! no handler invocation, and no backend I/O. This is enforced structurally
//! — the only call sites for the adapter and the handler sit after every
//! gate has passed. The quota reservation is released by a drop guard, so
//! every exit path (including handler panics unwinding through the gateway)
//! returns the slot exactly once.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use palisade_contracts::capability::{Action, CapabilityClaims, CapabilitySet};
use palisade_contracts::error::{ErrorEnvelope, GatewayError, GatewayResult};
use palisade_contracts::quota::{QuotaDecision, QuotaRequest};
use palisade_contracts::tool::ToolRequest;

use crate::authz;
use crate::registry::{ToolDescriptor, ToolInfo, ToolRegistry};
use crate::session::SessionContext;
use crate::tools::builtin_tools;
use crate::traits::{Adapter, QuotaGate};

/// The grant target guarding `tools/list` discovery.
pub const TOOL_CATALOG_TARGET: &str = "tools";

/// Releases a reserved concurrency slot when dropped.
struct ReservationGuard {
    gate: Arc<dyn QuotaGate>,
    key: Option<String>,
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.gate.release(&key);
        }
    }
}

/// The gateway value owning the execution boundary.
///
/// Constructed once at startup from frozen configuration; the only true
/// process-global in the system is the audit HMAC secret, which lives
/// inside the audit logger, not here. Sessions are minted exclusively by
/// [`Gateway::new_session`] — that construction capability is what makes a
/// `SessionContext` unforgeable.
pub struct Gateway {
    registry: ToolRegistry,
    adapter: Arc<dyn Adapter>,
    trusted_issuers: Vec<String>,
}

impl Gateway {
    /// Build a gateway over `adapter` with the builtin read tools
    /// registered.
    pub fn new(adapter: Arc<dyn Adapter>, trusted_issuers: Vec<String>) -> GatewayResult<Self> {
        let mut registry = ToolRegistry::new();
        for tool in builtin_tools() {
            registry.register(tool)?;
        }
        Ok(Self {
            registry,
            adapter,
            trusted_issuers,
        })
    }

    /// Register an extension tool. Mutation tools enter here and must carry
    /// `mutating: true` or the read-only gate cannot see them.
    pub fn register_tool(&mut self, descriptor: ToolDescriptor) -> GatewayResult<()> {
        self.registry.register(descriptor)
    }

    /// Mint a fresh, unbound session context.
    pub fn new_session(&self) -> SessionContext {
        SessionContext::mint()
    }

    /// Validate launcher capability claims and attach them to `session`.
    pub fn attach_capabilities_from_claims(
        &self,
        session: &SessionContext,
        claims: CapabilityClaims,
    ) -> GatewayResult<()> {
        let caps = CapabilitySet::from_claims(claims, &self.trusted_issuers, Utc::now())?;
        session.attach_capabilities(caps)
    }

    /// Run one invocation through the canonical pipeline.
    pub fn invoke(
        &self,
        req: &ToolRequest,
        session: &SessionContext,
    ) -> GatewayResult<serde_json::Value> {
        // ── Step 1: Session context must be bound ────────────────────────────
        session.assert_bound()?;

        // ── Step 2: Registry lookup ──────────────────────────────────────────
        let tool = self
            .registry
            .get(&req.tool_name)
            .ok_or_else(|| GatewayError::ToolNotFound {
                tool: req.tool_name.clone(),
            })?;

        // ── Step 3: Read-only gate ───────────────────────────────────────────
        //
        // Checked before authorization on purpose: a mutating tool is
        // rejected in read-only mode no matter what grants the caller holds.
        if req.mode.read_only && tool.mutating() {
            warn!(tool = %req.tool_name, "mutating tool rejected in read-only mode");
            return Err(GatewayError::ReadOnlyMode {
                tool: req.tool_name.clone(),
            });
        }

        // ── Step 4: Authorization ────────────────────────────────────────────
        let caps = session.capabilities_opt();
        let decision = authz::evaluate(
            caps,
            Action::ToolInvoke.as_str(),
            &req.tool_name,
            Utc::now(),
        );
        if !decision.allowed {
            return Err(GatewayError::Unauthorized {
                reason: decision.reason.to_string(),
            });
        }

        // ── Step 5: Quota reservation ────────────────────────────────────────
        //
        // The guard releases any held slot on every exit path below.
        let _reservation: Option<ReservationGuard> = match session.quota_engine_opt() {
            Some(gate) => {
                let quota_req = QuotaRequest {
                    tenant: session.tenant()?.to_string(),
                    identity: session.identity()?.to_string(),
                    cap_set_id: caps.map(|c| c.cap_set_id().to_string()),
                    tool: req.tool_name.clone(),
                };
                match gate.check_and_reserve(&quota_req) {
                    QuotaDecision::Denied { reason } => {
                        return Err(GatewayError::RateLimited {
                            reason: reason.to_string(),
                        });
                    }
                    QuotaDecision::Allowed { semaphore_key } => {
                        semaphore_key.map(|key| ReservationGuard {
                            gate: Arc::clone(gate),
                            key: Some(key),
                        })
                    }
                }
            }
            None => None,
        };

        // ── Step 6: Input schema validation ──────────────────────────────────
        tool.validate_input(&req.input)?;

        // ── Step 7: Handler invocation ───────────────────────────────────────
        //
        // The only call site that can reach an adapter, and therefore a
        // backend.
        debug!(tool = %req.tool_name, "all gates passed, invoking handler");
        (tool.handler())(&req.input, self.adapter.as_ref(), session)

        // ── Step 8: the reservation guard drops here, on every path ──────────
    }

    /// Like [`Gateway::invoke`], rendered into the `{ok, value|error}` wire
    /// envelope.
    pub fn dispatch(&self, req: &ToolRequest, session: &SessionContext) -> serde_json::Value {
        match self.invoke(req, session) {
            Ok(value) => json!({ "ok": true, "value": value }),
            Err(err) => serde_json::to_value(ErrorEnvelope::from_error(&err)).unwrap_or_else(
                |_| {
                    json!({
                        "ok": false,
                        "error": {
                            "code": "INTERNAL_ERROR",
                            "message": "error envelope serialization failed"
                        }
                    })
                },
            ),
        }
    }

    /// Project the registry for `tools/list` discovery.
    ///
    /// Discovery is itself capability-gated: the session needs a `tool.list`
    /// grant on the catalog target (or a trusted wildcard).
    pub fn list_tools(&self, session: &SessionContext) -> GatewayResult<Vec<ToolInfo>> {
        session.assert_bound()?;

        let decision = authz::evaluate(
            session.capabilities_opt(),
            Action::ToolList.as_str(),
            TOOL_CATALOG_TARGET,
            Utc::now(),
        );
        if !decision.allowed {
            return Err(GatewayError::Unauthorized {
                reason: decision.reason.to_string(),
            });
        }

        Ok(self.registry.list())
    }

    /// The adapter behind this gateway, for startup connect/health wiring.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
