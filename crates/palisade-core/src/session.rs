//! The session context: a one-shot binding of caller identity to a session.
//!
//! Lifecycle: `UNBOUND → BOUND`, optionally extended by two one-shot
//! attachments (capability set, quota gate). Later states extend earlier
//! ones; nothing is ever mutated or rebound. Accessors called before the
//! corresponding transition fail as security violations.
//!
//! Authenticity is a construction capability: the constructor is
//! crate-private and only [`Gateway::new_session`](crate::gateway::Gateway)
//! mints instances, so a look-alike struct from another crate can never
//! enter the pipeline.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tracing::info;

use palisade_contracts::capability::CapabilitySet;
use palisade_contracts::error::{GatewayError, GatewayResult};

use crate::traits::QuotaGate;

/// Generate a fresh session identifier from a CSPRNG.
pub fn fresh_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
struct Binding {
    identity: String,
    tenant: String,
    session_id: String,
    bound_at: DateTime<Utc>,
}

/// The per-session trust anchor threaded through every tool invocation.
pub struct SessionContext {
    binding: OnceLock<Binding>,
    capabilities: OnceLock<CapabilitySet>,
    quota: OnceLock<Arc<dyn QuotaGate>>,
}

impl SessionContext {
    /// Mint an unbound context. Crate-private on purpose; see the module
    /// docs on authenticity.
    pub(crate) fn mint() -> Self {
        Self {
            binding: OnceLock::new(),
            capabilities: OnceLock::new(),
            quota: OnceLock::new(),
        }
    }

    /// Transition `UNBOUND → BOUND` exactly once.
    ///
    /// `identity` and `tenant` come from the trusted launcher and must be
    /// non-empty; `session_id` is generated fresh per session (see
    /// [`fresh_session_id`]). A second call fails as a security violation —
    /// rebinding is how a confused deputy swaps tenants mid-session.
    pub fn bind(
        &self,
        identity: impl Into<String>,
        tenant: impl Into<String>,
        session_id: impl Into<String>,
    ) -> GatewayResult<()> {
        let identity = identity.into();
        let tenant = tenant.into();
        let session_id = session_id.into();

        if identity.is_empty() || tenant.is_empty() {
            return Err(GatewayError::SecurityViolation {
                reason: "identity and tenant must be non-empty".to_string(),
            });
        }

        let binding = Binding {
            identity,
            tenant,
            session_id,
            bound_at: Utc::now(),
        };

        self.binding
            .set(binding)
            .map_err(|_| GatewayError::SecurityViolation {
                reason: "session context is already bound".to_string(),
            })?;

        let bound = self.binding.get().expect("binding was just set");
        info!(
            tenant = %bound.tenant,
            session_id = %bound.session_id,
            "session context bound"
        );
        Ok(())
    }

    /// Attach the capability set, once, after binding.
    pub fn attach_capabilities(&self, capabilities: CapabilitySet) -> GatewayResult<()> {
        self.assert_bound()?;
        self.capabilities
            .set(capabilities)
            .map_err(|_| GatewayError::SecurityViolation {
                reason: "capabilities are already attached".to_string(),
            })
    }

    /// Attach the quota gate, once, after binding.
    pub fn attach_quota_engine(&self, engine: Arc<dyn QuotaGate>) -> GatewayResult<()> {
        self.assert_bound()?;
        self.quota
            .set(engine)
            .map_err(|_| GatewayError::SecurityViolation {
                reason: "quota engine is already attached".to_string(),
            })
    }

    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Fail unless bound. The pipeline's step 1, and every adapter's entry
    /// assertion.
    pub fn assert_bound(&self) -> GatewayResult<()> {
        if self.is_bound() {
            Ok(())
        } else {
            Err(GatewayError::SecurityViolation {
                reason: "session context is not bound".to_string(),
            })
        }
    }

    fn bound(&self) -> GatewayResult<&Binding> {
        self.binding
            .get()
            .ok_or_else(|| GatewayError::SecurityViolation {
                reason: "session context is not bound".to_string(),
            })
    }

    pub fn identity(&self) -> GatewayResult<&str> {
        Ok(&self.bound()?.identity)
    }

    pub fn tenant(&self) -> GatewayResult<&str> {
        Ok(&self.bound()?.tenant)
    }

    pub fn session_id(&self) -> GatewayResult<&str> {
        Ok(&self.bound()?.session_id)
    }

    pub fn bound_at(&self) -> GatewayResult<DateTime<Utc>> {
        Ok(self.bound()?.bound_at)
    }

    /// The attached capability set, failing when binding or attachment has
    /// not happened.
    pub fn capabilities(&self) -> GatewayResult<&CapabilitySet> {
        self.assert_bound()?;
        self.capabilities
            .get()
            .ok_or_else(|| GatewayError::SecurityViolation {
                reason: "no capability set is attached".to_string(),
            })
    }

    /// The attached capability set, `None` when absent. The authorizer
    /// treats absence as an explicit denial.
    pub fn capabilities_opt(&self) -> Option<&CapabilitySet> {
        self.capabilities.get()
    }

    /// The attached quota gate, failing when binding or attachment has not
    /// happened.
    pub fn quota_engine(&self) -> GatewayResult<&Arc<dyn QuotaGate>> {
        self.assert_bound()?;
        self.quota
            .get()
            .ok_or_else(|| GatewayError::SecurityViolation {
                reason: "no quota engine is attached".to_string(),
            })
    }

    /// The attached quota gate, `None` when the deployment runs without one.
    pub fn quota_engine_opt(&self) -> Option<&Arc<dyn QuotaGate>> {
        self.quota.get()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.binding.get() {
            Some(b) => f
                .debug_struct("SessionContext")
                .field("tenant", &b.tenant)
                .field("session_id", &b.session_id)
                .field("has_capabilities", &self.capabilities.get().is_some())
                .field("has_quota", &self.quota.get().is_some())
                .finish(),
            None => f.write_str("SessionContext(UNBOUND)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use palisade_contracts::capability::{CapabilityClaims, CapabilitySet};
    use palisade_contracts::quota::{QuotaDecision, QuotaRequest};

    struct NoopGate;

    impl QuotaGate for NoopGate {
        fn check_and_reserve(&self, _req: &QuotaRequest) -> QuotaDecision {
            QuotaDecision::Allowed {
                semaphore_key: None,
            }
        }

        fn release(&self, _semaphore_key: &str) {}
    }

    fn caps() -> CapabilitySet {
        let now = Utc::now();
        CapabilitySet::from_claims(
            CapabilityClaims {
                cap_set_id: "caps-1".to_string(),
                issued_at: now,
                expires_at: now + Duration::hours(1),
                issuer: "launcher".to_string(),
                grants: vec![],
            },
            &[],
            now,
        )
        .unwrap()
    }

    #[test]
    fn bind_exposes_the_binding() {
        let ctx = SessionContext::mint();
        assert!(!ctx.is_bound());

        ctx.bind("agent-7", "acme", fresh_session_id()).unwrap();

        assert!(ctx.is_bound());
        assert_eq!(ctx.identity().unwrap(), "agent-7");
        assert_eq!(ctx.tenant().unwrap(), "acme");
        assert!(!ctx.session_id().unwrap().is_empty());
    }

    #[test]
    fn accessors_fail_while_unbound() {
        let ctx = SessionContext::mint();

        assert!(ctx.assert_bound().is_err());
        assert!(ctx.identity().is_err());
        assert!(ctx.tenant().is_err());
        assert!(ctx.session_id().is_err());
        assert!(ctx.bound_at().is_err());
        assert!(ctx.capabilities().is_err());
        assert!(ctx.quota_engine().is_err());
    }

    #[test]
    fn rebinding_is_a_security_violation() {
        let ctx = SessionContext::mint();
        ctx.bind("agent-7", "acme", "s-1").unwrap();

        let err = ctx.bind("agent-8", "globex", "s-2").unwrap_err();
        assert!(matches!(err, GatewayError::SecurityViolation { .. }));

        // The original binding is untouched.
        assert_eq!(ctx.identity().unwrap(), "agent-7");
        assert_eq!(ctx.tenant().unwrap(), "acme");
    }

    #[test]
    fn empty_identity_or_tenant_rejected() {
        let ctx = SessionContext::mint();
        assert!(ctx.bind("", "acme", "s-1").is_err());

        let ctx = SessionContext::mint();
        assert!(ctx.bind("agent-7", "", "s-1").is_err());
    }

    #[test]
    fn attachments_require_binding() {
        let ctx = SessionContext::mint();
        assert!(ctx.attach_capabilities(caps()).is_err());
        assert!(ctx.attach_quota_engine(Arc::new(NoopGate)).is_err());
    }

    #[test]
    fn attachments_are_one_shot() {
        let ctx = SessionContext::mint();
        ctx.bind("agent-7", "acme", "s-1").unwrap();

        ctx.attach_capabilities(caps()).unwrap();
        assert!(ctx.attach_capabilities(caps()).is_err());
        assert_eq!(ctx.capabilities().unwrap().cap_set_id(), "caps-1");

        ctx.attach_quota_engine(Arc::new(NoopGate)).unwrap();
        assert!(ctx.attach_quota_engine(Arc::new(NoopGate)).is_err());
        assert!(ctx.quota_engine().is_ok());
    }

    #[test]
    fn fresh_session_ids_are_unique() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| fresh_session_id()).collect();
        assert_eq!(ids.len(), 100);
    }
}
