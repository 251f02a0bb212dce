//! ORDER BY clause checking.
//!
//! Sorting is opt-in: operators list the exact `schema.table.column` keys
//! callers may sort on. With no policy configured, the presence of an ORDER
//! BY clause is itself a rejection. The accepted grammar is deliberately
//! tiny — `qualifier.column [ASC|DESC]` or `schema.table.column [ASC|DESC]`,
//! at most two keys. Numeric positions, bare columns, expressions,
//! parentheses, collations, and `NULLS {FIRST|LAST}` all fall outside the
//! key pattern and reject.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::QualifiedTable;

use crate::validator::{AliasMap, Resolution};

/// The sort keys a deployment permits, as lowercase `schema.table.column`.
#[derive(Debug, Clone, Default)]
pub struct OrderByPolicy {
    allowed: BTreeSet<String>,
}

impl OrderByPolicy {
    pub fn new(columns: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: columns
                .into_iter()
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// `key` is `schema.table.column`, any case.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.allowed.contains(&key.to_ascii_lowercase())
    }
}

fn order_by_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("static regex"))
}

fn clause_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLIMIT\b").expect("static regex"))
}

fn sort_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_][A-Za-z0-9_]*))?(?:\s+(?:ASC|DESC))?$",
        )
        .expect("static regex")
    })
}

fn rejected(reason: impl Into<String>) -> GatewayError {
    GatewayError::QueryRejected {
        reason: reason.into(),
    }
}

/// Check any ORDER BY clause in `q` against `policy`.
///
/// `aliases` and `tables` come from table extraction on the same query, so
/// qualifier resolution sees exactly the FROM/JOIN sources the query names.
pub(crate) fn check_order_by(
    q: &str,
    policy: Option<&OrderByPolicy>,
    aliases: &AliasMap,
    tables: &BTreeSet<QualifiedTable>,
) -> GatewayResult<()> {
    let occurrences: Vec<_> = order_by_keyword().find_iter(q).collect();
    match occurrences.len() {
        0 => return Ok(()),
        1 => {}
        _ => return Err(rejected("multiple ORDER BY clauses")),
    }

    let policy = match policy {
        Some(p) if !p.is_empty() => p,
        _ => return Err(rejected("ORDER BY is not permitted for this caller")),
    };

    // The clause runs from the keyword to LIMIT or end of query. OFFSET and
    // set operators are banned upstream, so nothing else can follow it.
    let start = occurrences[0].end();
    let tail = &q[start..];
    let clause = match clause_end().find(tail) {
        Some(m) => &tail[..m.start()],
        None => tail,
    };

    let keys: Vec<&str> = clause.split(',').map(str::trim).collect();
    if keys.len() > 2 {
        return Err(rejected("ORDER BY is limited to two sort keys"));
    }

    for key in keys {
        if key.is_empty() {
            return Err(rejected("empty ORDER BY sort key"));
        }
        let caps = sort_key()
            .captures(key)
            .ok_or_else(|| rejected("ORDER BY key must be qualifier.column or schema.table.column"))?;

        let resolved = match caps.get(3) {
            // schema.table.column — the named table must be one of the
            // query's own sources.
            Some(column) => {
                let table = QualifiedTable::new(&caps[1], &caps[2]);
                if !tables.contains(&table) {
                    return Err(rejected("ORDER BY references a table the query does not read"));
                }
                format!("{table}.{}", column.as_str())
            }
            // qualifier.column — resolve through the alias map.
            None => {
                let qualifier = &caps[1];
                match aliases.resolve(qualifier) {
                    Some(Resolution::Unique(table)) => format!("{table}.{}", &caps[2]),
                    Some(Resolution::Ambiguous) => {
                        return Err(rejected("ambiguous ORDER BY qualifier"))
                    }
                    None => return Err(rejected("unknown ORDER BY qualifier")),
                }
            }
        };

        if !policy.is_allowed(&resolved) {
            return Err(rejected("ORDER BY column is not in the sort allowlist"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::SqlValidator;

    fn policy(cols: &[&str]) -> OrderByPolicy {
        OrderByPolicy::new(cols.iter().map(|s| s.to_string()))
    }

    fn check(q: &str, p: Option<&OrderByPolicy>) -> GatewayResult<()> {
        SqlValidator::new().validate(q, p).map(|_| ())
    }

    const USERS_CREATED: &str = "public.users.created_at";
    const USERS_NAME: &str = "public.users.name";

    #[test]
    fn alias_qualifier_resolves_and_passes() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users u ORDER BY u.created_at DESC",
            Some(&p),
        )
        .unwrap();
    }

    #[test]
    fn bare_table_name_qualifier_resolves() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users ORDER BY users.created_at",
            Some(&p),
        )
        .unwrap();
    }

    #[test]
    fn fully_qualified_key_passes() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users ORDER BY public.users.created_at ASC",
            Some(&p),
        )
        .unwrap();
    }

    #[test]
    fn two_keys_pass_three_reject() {
        let p = policy(&[USERS_CREATED, USERS_NAME, "public.users.id"]);
        check(
            "SELECT id FROM public.users u ORDER BY u.created_at, u.name",
            Some(&p),
        )
        .unwrap();

        let err = check(
            "SELECT id FROM public.users u ORDER BY u.created_at, u.name, u.id",
            Some(&p),
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::QueryRejected { .. }));
    }

    #[test]
    fn limit_after_order_by_is_outside_the_clause() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users u ORDER BY u.created_at DESC LIMIT 5",
            Some(&p),
        )
        .unwrap();
    }

    #[test]
    fn column_outside_allowlist_rejects() {
        let p = policy(&[USERS_CREATED]);
        let err = check(
            "SELECT id FROM public.users u ORDER BY u.name",
            Some(&p),
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::QueryRejected { .. }));
    }

    #[test]
    fn numeric_position_rejects() {
        let p = policy(&[USERS_CREATED]);
        check("SELECT id FROM public.users ORDER BY 1", Some(&p)).unwrap_err();
    }

    #[test]
    fn bare_column_rejects() {
        let p = policy(&[USERS_CREATED]);
        check("SELECT id FROM public.users ORDER BY created_at", Some(&p)).unwrap_err();
    }

    #[test]
    fn expression_rejects() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users u ORDER BY lower(u.name)",
            Some(&p),
        )
        .unwrap_err();
    }

    #[test]
    fn nulls_first_rejects() {
        let p = policy(&[USERS_CREATED]);
        check(
            "SELECT id FROM public.users u ORDER BY u.created_at DESC NULLS FIRST",
            Some(&p),
        )
        .unwrap_err();
    }

    #[test]
    fn unknown_qualifier_rejects() {
        let p = policy(&["public.orders.total"]);
        check(
            "SELECT id FROM public.users u ORDER BY o.total",
            Some(&p),
        )
        .unwrap_err();
    }

    #[test]
    fn ambiguous_qualifier_rejects() {
        // Two schemas contribute a table named "events"; the bare name no
        // longer resolves.
        let p = policy(&["public.events.at", "archive.events.at"]);
        let err = check(
            "SELECT e.at FROM public.events JOIN archive.events ON public.events.id = archive.events.id ORDER BY events.at",
            Some(&p),
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::QueryRejected { .. }));
    }

    #[test]
    fn qualified_key_for_foreign_table_rejects() {
        let p = policy(&["public.orders.total"]);
        check(
            "SELECT id FROM public.users ORDER BY public.orders.total",
            Some(&p),
        )
        .unwrap_err();
    }

    #[test]
    fn empty_policy_behaves_like_no_policy() {
        let p = OrderByPolicy::default();
        check(
            "SELECT id FROM public.users u ORDER BY u.created_at",
            Some(&p),
        )
        .unwrap_err();
    }
}
