//! Validator-to-allowlist glue.
//!
//! Takes the table set extracted by the validator and checks every member
//! against the allowlist. The first miss wins; success hands the same set
//! back so callers chain directly into execution.

use std::collections::BTreeSet;

use tracing::warn;

use palisade_contracts::error::GatewayResult;
use palisade_contracts::query::QualifiedTable;

use crate::allowlist::Allowlist;

/// Enforce the allowlist over every extracted table.
pub fn enforce_tables<'a>(
    tables: &'a BTreeSet<QualifiedTable>,
    allowlist: &Allowlist,
) -> GatewayResult<&'a BTreeSet<QualifiedTable>> {
    for table in tables {
        if let Err(err) = allowlist.enforce_table(table) {
            warn!(table = %table, "query references a table outside the allowlist");
            return Err(err);
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_contracts::error::GatewayError;

    fn tables(names: &[(&str, &str)]) -> BTreeSet<QualifiedTable> {
        names
            .iter()
            .map(|(s, t)| QualifiedTable::new(*s, *t))
            .collect()
    }

    #[test]
    fn all_allowed_tables_pass_through_unchanged() {
        let allowlist = Allowlist::new(vec!["public".to_string()], vec![]);
        let set = tables(&[("public", "users"), ("public", "orders")]);

        let result = enforce_tables(&set, &allowlist).unwrap();
        assert_eq!(result, &set);
    }

    #[test]
    fn first_denied_table_is_reported() {
        let allowlist = Allowlist::new(
            vec!["public".to_string()],
            vec!["public.users".to_string()],
        );
        let set = tables(&[("public", "users"), ("public", "secrets")]);

        let err = enforce_tables(&set, &allowlist).unwrap_err();
        match err {
            GatewayError::UnauthorizedTable { table } => assert_eq!(table, "public.secrets"),
            other => panic!("expected UnauthorizedTable, got {:?}", other),
        }
    }
}
