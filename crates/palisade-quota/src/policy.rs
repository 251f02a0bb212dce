//! Policy resolution and scope-key derivation.
//!
//! Scope keys are the load-bearing invariant of the quota engine: they are
//! derived from the *matched policy's* granularity, never from the request.
//! A tenant-wide policy puts every identity and every capability set of that
//! tenant into one bucket, so rotating credentials cannot mint fresh
//! capacity.

use palisade_contracts::quota::{QuotaDenyReason, QuotaPolicy, QuotaRequest};

/// Find the single policy applying to `req`.
///
/// Zero applicable policies and two-or-more both deny: with no policy there
/// is no scope to count under, and with several the choice of scope would be
/// attacker-observable guesswork.
pub fn resolve_policy<'a>(
    policies: &'a [QuotaPolicy],
    req: &QuotaRequest,
) -> Result<&'a QuotaPolicy, QuotaDenyReason> {
    let mut matched = policies.iter().filter(|p| p.applies(req));
    let first = matched.next().ok_or(QuotaDenyReason::PolicyMissing)?;
    if matched.next().is_some() {
        return Err(QuotaDenyReason::PolicyAmbiguous);
    }
    Ok(first)
}

/// Derive the counter key for `req` under `policy`.
///
/// Selectors the policy leaves null are omitted from the key. Pure; tested
/// directly against credential-rotation vectors.
pub fn scope_key(policy: &QuotaPolicy, req: &QuotaRequest) -> String {
    let mut key = format!("tenant={}", policy.tenant);
    if policy.identity.is_some() {
        key.push_str("|identity=");
        key.push_str(&req.identity);
    }
    if policy.cap_set_id.is_some() {
        key.push_str("|capset=");
        key.push_str(req.cap_set_id.as_deref().unwrap_or(""));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_contracts::quota::QuotaDimension;
    use std::collections::BTreeMap;

    fn policy(tenant: &str, identity: Option<&str>, cap_set_id: Option<&str>) -> QuotaPolicy {
        QuotaPolicy {
            tenant: tenant.to_string(),
            identity: identity.map(|s| s.to_string()),
            cap_set_id: cap_set_id.map(|s| s.to_string()),
            limits: BTreeMap::from([(QuotaDimension::RatePerMinute, 10)]),
        }
    }

    fn request(tenant: &str, identity: &str, cap_set_id: Option<&str>) -> QuotaRequest {
        QuotaRequest {
            tenant: tenant.to_string(),
            identity: identity.to_string(),
            cap_set_id: cap_set_id.map(|s| s.to_string()),
            tool: "query_read".to_string(),
        }
    }

    // ── resolve_policy ───────────────────────────────────────────────────────

    #[test]
    fn exactly_one_match_resolves() {
        let policies = vec![policy("acme", None, None), policy("globex", None, None)];
        let found = resolve_policy(&policies, &request("acme", "alice", None)).unwrap();
        assert_eq!(found.tenant, "acme");
    }

    #[test]
    fn no_match_is_policy_missing() {
        let policies = vec![policy("acme", None, None)];
        let err = resolve_policy(&policies, &request("globex", "alice", None)).unwrap_err();
        assert_eq!(err, QuotaDenyReason::PolicyMissing);
    }

    #[test]
    fn overlapping_matches_are_ambiguous() {
        // Both a tenant-wide and an identity-scoped policy apply to alice.
        let policies = vec![policy("acme", None, None), policy("acme", Some("alice"), None)];
        let err = resolve_policy(&policies, &request("acme", "alice", None)).unwrap_err();
        assert_eq!(err, QuotaDenyReason::PolicyAmbiguous);
    }

    // ── scope_key ────────────────────────────────────────────────────────────

    #[test]
    fn tenant_wide_policy_ignores_identity_and_capset() {
        let p = policy("acme", None, None);

        let k1 = scope_key(&p, &request("acme", "alice", Some("caps-1")));
        let k2 = scope_key(&p, &request("acme", "bob", Some("caps-2")));
        let k3 = scope_key(&p, &request("acme", "alice", None));

        // Credential rotation lands in the same bucket.
        assert_eq!(k1, k2);
        assert_eq!(k1, k3);
        assert_eq!(k1, "tenant=acme");
    }

    #[test]
    fn identity_scoped_policy_splits_identities() {
        let p = policy("acme", Some("alice"), None);

        let k_alice = scope_key(&p, &request("acme", "alice", Some("caps-1")));
        let k_alice_rotated = scope_key(&p, &request("acme", "alice", Some("caps-2")));

        // Same identity, rotated capability set: same bucket.
        assert_eq!(k_alice, k_alice_rotated);
        assert_eq!(k_alice, "tenant=acme|identity=alice");
    }

    #[test]
    fn capset_scoped_policy_includes_the_capset() {
        let p = policy("acme", None, Some("caps-1"));
        let k = scope_key(&p, &request("acme", "alice", Some("caps-1")));
        assert_eq!(k, "tenant=acme|capset=caps-1");
    }
}
