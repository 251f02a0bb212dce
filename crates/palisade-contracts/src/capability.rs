//! Capability grant types.
//!
//! PALISADE uses a capability model: a session may only invoke a tool if its
//! attached `CapabilitySet` holds a matching grant. Capability sets arrive
//! pre-verified from the trusted launcher, are validated once at
//! construction, and are never modified afterwards — grants cannot be
//! elevated at runtime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// The closed set of grantable actions.
///
/// Anything outside this enum is denied before grant matching even runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Invoke a named tool.
    #[serde(rename = "tool.invoke")]
    ToolInvoke,
    /// Discover the tool registry.
    #[serde(rename = "tool.list")]
    ToolList,
    /// Read a named resource.
    #[serde(rename = "resource.read")]
    ResourceRead,
    /// Enumerate resources.
    #[serde(rename = "resource.list")]
    ResourceList,
}

impl Action {
    /// Parse the wire spelling of an action. Unknown spellings return `None`
    /// so the authorizer can deny them explicitly.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tool.invoke" => Some(Action::ToolInvoke),
            "tool.list" => Some(Action::ToolList),
            "resource.read" => Some(Action::ResourceRead),
            "resource.list" => Some(Action::ResourceList),
            _ => None,
        }
    }

    /// The wire spelling of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ToolInvoke => "tool.invoke",
            Action::ToolList => "tool.list",
            Action::ResourceRead => "resource.read",
            Action::ResourceList => "resource.list",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wildcard target. Only trusted issuers may mint grants carrying it.
pub const WILDCARD_TARGET: &str = "*";

/// A single `(action, target)` permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub action: Action,
    /// A tool or resource name, or [`WILDCARD_TARGET`].
    pub target: String,
}

/// The raw capability document as handed over by the launcher, before
/// validation. Deserialized from JSON and immediately fed to
/// [`CapabilitySet::from_claims`]; never used directly for authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityClaims {
    pub cap_set_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub issuer: String,
    pub grants: Vec<Grant>,
}

/// A validated, immutable set of capability grants with a TTL.
///
/// Fields are private; consumers read through accessors and can never add,
/// remove, or alter grants after construction.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    cap_set_id: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    issuer: String,
    grants: Vec<Grant>,
}

impl CapabilitySet {
    /// Tolerated forward clock skew on `issued_at`.
    pub const MAX_ISSUED_AT_SKEW_SECS: i64 = 60;

    /// Validate launcher claims into a usable capability set.
    ///
    /// Construction enforces every static invariant so evaluation never has
    /// to re-check them:
    ///
    /// - `issued_at` at most 60 s in the future (clock-skew tolerance)
    /// - `expires_at` strictly after `issued_at`
    /// - wildcard (`"*"`) targets only from an issuer in `trusted_issuers`
    ///
    /// Returns `GatewayError::SecurityViolation` when any invariant fails —
    /// a malformed capability document is treated the same as a forged one.
    pub fn from_claims(
        claims: CapabilityClaims,
        trusted_issuers: &[String],
        now: DateTime<Utc>,
    ) -> GatewayResult<Self> {
        if claims.issued_at > now + Duration::seconds(Self::MAX_ISSUED_AT_SKEW_SECS) {
            return Err(GatewayError::SecurityViolation {
                reason: "capability set issued in the future beyond skew tolerance".to_string(),
            });
        }
        if claims.expires_at <= claims.issued_at {
            return Err(GatewayError::SecurityViolation {
                reason: "capability set expires at or before issuance".to_string(),
            });
        }
        let issuer_trusted = trusted_issuers.iter().any(|i| i == &claims.issuer);
        if !issuer_trusted && claims.grants.iter().any(|g| g.target == WILDCARD_TARGET) {
            return Err(GatewayError::SecurityViolation {
                reason: "wildcard grant from an untrusted issuer".to_string(),
            });
        }

        Ok(Self {
            cap_set_id: claims.cap_set_id,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
            issuer: claims.issuer,
            grants: claims.grants,
        })
    }

    pub fn cap_set_id(&self) -> &str {
        &self.cap_set_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// An expired set grants nothing.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Find an exact `(action, target)` grant.
    pub fn find_grant(&self, action: Action, target: &str) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|g| g.action == action && g.target == target)
    }

    /// Find a wildcard grant for `action`.
    ///
    /// Wildcard grants exist only in sets minted by a trusted issuer; the
    /// constructor rejected every other combination.
    pub fn find_wildcard_grant(&self, action: Action) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|g| g.action == action && g.target == WILDCARD_TARGET)
    }

    /// Iterate all grants, for discovery and logging.
    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }
}
