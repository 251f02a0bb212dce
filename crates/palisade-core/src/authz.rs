//! Capability-based authorization.
//!
//! A single pure decision function over the session's capability set.
//! The decision table runs top to bottom, first match wins:
//!
//! | Precondition | Decision |
//! |---|---|
//! | action outside the closed enum | `DENIED_UNKNOWN_ACTION` |
//! | no capability set | `DENIED_NO_CAPABILITY` |
//! | set expired | `DENIED_EXPIRED` |
//! | no exact and no wildcard grant | `DENIED_NO_GRANT` |
//! | otherwise | `ALLOWED` |
//!
//! Wildcard grants are not an expansion of the exact match — they are a
//! distinct rule, and their trusted-issuer precondition was already enforced
//! when the capability set was constructed.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use palisade_contracts::capability::{Action, CapabilitySet, Grant};

/// Why the evaluation allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzReason {
    Allowed,
    DeniedUnknownAction,
    DeniedNoCapability,
    DeniedExpired,
    DeniedNoGrant,
}

impl AuthzReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthzReason::Allowed => "ALLOWED",
            AuthzReason::DeniedUnknownAction => "DENIED_UNKNOWN_ACTION",
            AuthzReason::DeniedNoCapability => "DENIED_NO_CAPABILITY",
            AuthzReason::DeniedExpired => "DENIED_EXPIRED",
            AuthzReason::DeniedNoGrant => "DENIED_NO_GRANT",
        }
    }
}

impl std::fmt::Display for AuthzReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one evaluation.
#[derive(Debug, Clone)]
pub struct AuthzDecision<'a> {
    pub allowed: bool,
    pub reason: AuthzReason,
    /// The grant that allowed the action, when one did.
    pub grant: Option<&'a Grant>,
}

impl<'a> AuthzDecision<'a> {
    fn deny(reason: AuthzReason) -> Self {
        Self {
            allowed: false,
            reason,
            grant: None,
        }
    }

    fn allow(grant: &'a Grant) -> Self {
        Self {
            allowed: true,
            reason: AuthzReason::Allowed,
            grant: Some(grant),
        }
    }
}

/// Evaluate `(action, target)` against `capabilities` at time `now`.
///
/// Every decision — allow or deny — is logged with its reason.
pub fn evaluate<'a>(
    capabilities: Option<&'a CapabilitySet>,
    action: &str,
    target: &str,
    now: DateTime<Utc>,
) -> AuthzDecision<'a> {
    let decision = evaluate_inner(capabilities, action, target, now);

    if decision.allowed {
        debug!(action, target, reason = %decision.reason, "authorization allowed");
    } else {
        warn!(action, target, reason = %decision.reason, "authorization denied");
    }
    decision
}

fn evaluate_inner<'a>(
    capabilities: Option<&'a CapabilitySet>,
    action: &str,
    target: &str,
    now: DateTime<Utc>,
) -> AuthzDecision<'a> {
    let action = match Action::parse(action) {
        Some(a) => a,
        None => return AuthzDecision::deny(AuthzReason::DeniedUnknownAction),
    };

    let caps = match capabilities {
        Some(c) => c,
        None => return AuthzDecision::deny(AuthzReason::DeniedNoCapability),
    };

    if caps.is_expired(now) {
        return AuthzDecision::deny(AuthzReason::DeniedExpired);
    }

    if let Some(grant) = caps.find_grant(action, target) {
        return AuthzDecision::allow(grant);
    }
    if let Some(grant) = caps.find_wildcard_grant(action) {
        return AuthzDecision::allow(grant);
    }

    AuthzDecision::deny(AuthzReason::DeniedNoGrant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use palisade_contracts::capability::CapabilityClaims;

    fn caps_with(grants: Vec<Grant>) -> CapabilitySet {
        let now = Utc::now();
        CapabilitySet::from_claims(
            CapabilityClaims {
                cap_set_id: "caps-1".to_string(),
                issued_at: now,
                expires_at: now + Duration::hours(1),
                issuer: "launcher".to_string(),
                grants,
            },
            &["launcher".to_string()],
            now,
        )
        .unwrap()
    }

    fn grant(action: Action, target: &str) -> Grant {
        Grant {
            action,
            target: target.to_string(),
        }
    }

    #[test]
    fn unknown_action_denied_before_anything_else() {
        // Even with a wildcard set attached, a bad action spelling loses.
        let caps = caps_with(vec![grant(Action::ToolInvoke, "*")]);
        let d = evaluate(Some(&caps), "tool.destroy", "query_read", Utc::now());

        assert!(!d.allowed);
        assert_eq!(d.reason, AuthzReason::DeniedUnknownAction);
    }

    #[test]
    fn missing_capability_set_denied() {
        let d = evaluate(None, "tool.invoke", "query_read", Utc::now());
        assert!(!d.allowed);
        assert_eq!(d.reason, AuthzReason::DeniedNoCapability);
    }

    #[test]
    fn expired_set_grants_nothing() {
        let caps = caps_with(vec![grant(Action::ToolInvoke, "query_read")]);
        let after_expiry = caps.expires_at() + Duration::seconds(1);

        let d = evaluate(Some(&caps), "tool.invoke", "query_read", after_expiry);
        assert!(!d.allowed);
        assert_eq!(d.reason, AuthzReason::DeniedExpired);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        // expiresAt <= now denies: the exact boundary instant is expired.
        let caps = caps_with(vec![grant(Action::ToolInvoke, "query_read")]);
        let d = evaluate(Some(&caps), "tool.invoke", "query_read", caps.expires_at());
        assert_eq!(d.reason, AuthzReason::DeniedExpired);
    }

    #[test]
    fn exact_grant_allows() {
        let caps = caps_with(vec![grant(Action::ToolInvoke, "query_read")]);
        let d = evaluate(Some(&caps), "tool.invoke", "query_read", Utc::now());

        assert!(d.allowed);
        assert_eq!(d.reason, AuthzReason::Allowed);
        assert_eq!(d.grant.unwrap().target, "query_read");
    }

    #[test]
    fn grant_is_specific_to_action_and_target() {
        let caps = caps_with(vec![grant(Action::ToolInvoke, "query_read")]);

        let d = evaluate(Some(&caps), "tool.invoke", "list_tables", Utc::now());
        assert_eq!(d.reason, AuthzReason::DeniedNoGrant);

        let d = evaluate(Some(&caps), "tool.list", "query_read", Utc::now());
        assert_eq!(d.reason, AuthzReason::DeniedNoGrant);
    }

    #[test]
    fn wildcard_grant_matches_any_target_of_its_action() {
        let caps = caps_with(vec![grant(Action::ToolInvoke, "*")]);

        let d = evaluate(Some(&caps), "tool.invoke", "anything", Utc::now());
        assert!(d.allowed);
        assert_eq!(d.grant.unwrap().target, "*");

        // The wildcard does not leak into other actions.
        let d = evaluate(Some(&caps), "tool.list", "anything", Utc::now());
        assert!(!d.allowed);
    }
}
