//! Regex-based validator for the read-only SELECT dialect.
//!
//! Design posture: strict pattern matching, reject-by-default, no AST. The
//! accepted dialect is deliberately narrow; anything the patterns do not
//! positively recognize is rejected. The rejection set:
//!
//! | Rule | Rejects |
//! |---|---|
//! | prefix   | anything not starting `SELECT` |
//! | metachar | `;` `--` `/*` `*/` `#`, control bytes `\x00`-`\x1F` |
//! | keyword  | `WITH` `UNION` `EXCEPT` `INTERSECT` `OFFSET` `INTO` `FOR UPDATE` `FOR SHARE` and all write/DDL/DCL verbs |
//! | tables   | unqualified references, comma (implicit cross) joins, three-part names, zero extracted tables |
//! | order-by | more than one clause, >2 keys, positions, bare columns, expressions, unresolvable or disallowed qualifiers |
//!
//! Over-extraction of tables is acceptable — the allowlist rejects the
//! excess. Any accepted-but-dangerous form discovered later is a regression
//! to be added to the table above.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::debug;

use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::{QualifiedTable, ValidatedQuery};

use crate::orderby::{self, OrderByPolicy};

/// Tokens that terminate a table reference and therefore can never be an
/// alias.
const RESERVED: &[&str] = &[
    "select", "from", "where", "on", "join", "inner", "left", "right", "full", "outer", "cross",
    "natural", "group", "order", "having", "limit", "and", "or", "not", "as", "using", "set",
];

fn is_reserved(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    RESERVED.iter().any(|r| *r == lower)
}

/// How an ORDER BY qualifier resolves against the FROM/JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Unique(QualifiedTable),
    /// Two sources claimed the same name; using it as a qualifier rejects.
    Ambiguous,
}

/// Alias map built during table extraction: alias and bare table names,
/// lowercased, to the qualified tables they denote.
#[derive(Debug, Default)]
pub(crate) struct AliasMap {
    entries: BTreeMap<String, Resolution>,
}

impl AliasMap {
    fn insert(&mut self, name: &str, table: &QualifiedTable) {
        let key = name.to_ascii_lowercase();
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, Resolution::Unique(table.clone()));
            }
            Some(Resolution::Unique(existing)) if existing == table => {}
            Some(_) => {
                self.entries.insert(key, Resolution::Ambiguous);
            }
        }
    }

    pub(crate) fn resolve(&self, qualifier: &str) -> Option<&Resolution> {
        self.entries.get(&qualifier.to_ascii_lowercase())
    }
}

/// The compiled validator. Construct once (regex compilation is not free)
/// and share; `validate` is pure and takes `&self`.
#[derive(Debug)]
pub struct SqlValidator {
    select_prefix: Regex,
    banned_keyword: Regex,
    from_join: Regex,
    qualified_table: Regex,
    alias: Regex,
    leading_comma: Regex,
}

impl SqlValidator {
    pub fn new() -> Self {
        Self {
            select_prefix: Regex::new(r"(?i)^SELECT\s+").expect("static regex"),
            banned_keyword: Regex::new(
                r"(?i)\b(?:WITH|UNION|EXCEPT|INTERSECT|OFFSET|INTO|INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|EXEC|EXECUTE|COPY|FOR\s+UPDATE|FOR\s+SHARE)\b",
            )
            .expect("static regex"),
            from_join: Regex::new(r"(?i)\b(?:FROM|JOIN)\s+").expect("static regex"),
            qualified_table: Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)")
                .expect("static regex"),
            alias: Regex::new(r"^\s+(?:[Aa][Ss]\s+)?([A-Za-z_][A-Za-z0-9_]*)")
                .expect("static regex"),
            leading_comma: Regex::new(r"^\s*,").expect("static regex"),
        }
    }

    /// Validate `query` against the read-only dialect.
    ///
    /// Returns the trimmed query plus every extracted table reference, or
    /// `QueryRejected` / `InvalidQuery` naming the violated rule. The
    /// `order_by` policy lists the sort keys a caller may use; `None` (or an
    /// empty policy) makes any ORDER BY clause a rejection.
    pub fn validate(
        &self,
        query: &str,
        order_by: Option<&OrderByPolicy>,
    ) -> GatewayResult<ValidatedQuery> {
        let q = query.trim();

        if q.is_empty() {
            return Err(GatewayError::QueryRejected {
                reason: "empty query".to_string(),
            });
        }

        // Control bytes never survive: they defeat word-boundary matching.
        if q.bytes().any(|b| b < 0x20) {
            return Err(GatewayError::QueryRejected {
                reason: "control character in query".to_string(),
            });
        }

        if !self.select_prefix.is_match(q) {
            return Err(GatewayError::QueryRejected {
                reason: "only SELECT statements are accepted".to_string(),
            });
        }

        for token in [";", "--", "/*", "*/", "#"] {
            if q.contains(token) {
                return Err(GatewayError::QueryRejected {
                    reason: format!("forbidden token '{token}'"),
                });
            }
        }

        if let Some(found) = self.banned_keyword.find(q) {
            return Err(GatewayError::QueryRejected {
                reason: format!("forbidden keyword '{}'", found.as_str().to_uppercase()),
            });
        }

        let (tables, aliases) = self.extract_tables(q)?;
        if tables.is_empty() {
            // Fail-closed: a SELECT we cannot attribute to tables cannot be
            // checked against the allowlist.
            return Err(GatewayError::InvalidQuery {
                reason: "no schema-qualified table references extracted".to_string(),
            });
        }

        orderby::check_order_by(q, order_by, &aliases, &tables)?;

        debug!(table_count = tables.len(), "query validated");

        Ok(ValidatedQuery {
            query: q.to_string(),
            tables,
        })
    }

    /// Walk every `FROM` / `JOIN` keyword and demand a schema-qualified
    /// table immediately after it.
    fn extract_tables(
        &self,
        q: &str,
    ) -> GatewayResult<(BTreeSet<QualifiedTable>, AliasMap)> {
        let mut tables = BTreeSet::new();
        let mut aliases = AliasMap::default();

        for keyword in self.from_join.find_iter(q) {
            let rest = &q[keyword.end()..];

            let caps = self.qualified_table.captures(rest).ok_or_else(|| {
                GatewayError::QueryRejected {
                    reason: "table reference must be schema-qualified".to_string(),
                }
            })?;
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let table = QualifiedTable::new(&caps[1], &caps[2]);
            let mut after = &rest[whole..];

            // A third dotted part would mean we mis-split a catalog-qualified
            // name; refuse rather than guess.
            if after.starts_with('.') {
                return Err(GatewayError::QueryRejected {
                    reason: "three-part table names are not supported".to_string(),
                });
            }

            if let Some(alias_caps) = self.alias.captures(after) {
                let name = alias_caps.get(1).map(|m| m.as_str()).unwrap_or("");
                if !is_reserved(name) {
                    aliases.insert(name, &table);
                    after = &after[alias_caps.get(0).map(|m| m.end()).unwrap_or(0)..];
                }
            }

            // A comma directly after the reference is an implicit cross join.
            if self.leading_comma.is_match(after) {
                return Err(GatewayError::QueryRejected {
                    reason: "implicit cross join (comma) is not supported".to_string(),
                });
            }

            // The bare table name also works as an ORDER BY qualifier.
            aliases.insert(&table.table, &table);
            tables.insert(table);
        }

        Ok((tables, aliases))
    }
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new()
    }
}
