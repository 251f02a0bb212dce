//! Schema/table access lists.
//!
//! Loaded once at startup from gateway configuration and immutable
//! thereafter. An empty schema set denies everything; an empty table set
//! admits any table inside an allowed schema (permit-by-schema).

use std::collections::BTreeSet;

use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::QualifiedTable;

/// The table-level access list consulted after SQL validation.
#[derive(Debug, Clone)]
pub struct Allowlist {
    allowed_schemas: BTreeSet<String>,
    /// Qualified `schema.table` entries. Empty means permit-by-schema.
    allowed_tables: BTreeSet<String>,
}

impl Allowlist {
    pub fn new(
        schemas: impl IntoIterator<Item = String>,
        tables: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            allowed_schemas: schemas.into_iter().collect(),
            allowed_tables: tables.into_iter().collect(),
        }
    }

    /// True when `schema` is listed. An empty schema list allows nothing.
    pub fn is_schema_allowed(&self, schema: &str) -> bool {
        self.allowed_schemas.contains(schema)
    }

    /// True when `schema.table` is reachable under this list.
    pub fn is_table_allowed(&self, schema: &str, table: &str) -> bool {
        if !self.is_schema_allowed(schema) {
            return false;
        }
        if self.allowed_tables.is_empty() {
            // Permit-by-schema: operators who want explicit tables list them.
            return true;
        }
        self.allowed_tables.contains(&format!("{schema}.{table}"))
    }

    /// Fail unless the qualified table is reachable.
    pub fn enforce_table(&self, table: &QualifiedTable) -> GatewayResult<()> {
        if self.is_table_allowed(&table.schema, &table.table) {
            Ok(())
        } else {
            Err(GatewayError::UnauthorizedTable {
                table: table.to_string(),
            })
        }
    }

    /// The allowed schemas, for catalog filtering.
    pub fn schemas(&self) -> impl Iterator<Item = &str> {
        self.allowed_schemas.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_schema_list_denies_everything() {
        let list = Allowlist::new(vec![], strings(&["public.users"]));

        assert!(!list.is_schema_allowed("public"));
        assert!(!list.is_table_allowed("public", "users"));
    }

    #[test]
    fn empty_table_list_permits_by_schema() {
        let list = Allowlist::new(strings(&["public"]), vec![]);

        assert!(list.is_table_allowed("public", "users"));
        assert!(list.is_table_allowed("public", "anything"));
        assert!(!list.is_table_allowed("internal", "users"));
    }

    #[test]
    fn explicit_table_list_requires_exact_match() {
        let list = Allowlist::new(strings(&["public"]), strings(&["public.users"]));

        assert!(list.is_table_allowed("public", "users"));
        assert!(!list.is_table_allowed("public", "secrets"));
    }

    #[test]
    fn table_listed_under_disallowed_schema_is_still_denied() {
        let list = Allowlist::new(strings(&["public"]), strings(&["internal.audit"]));

        assert!(!list.is_table_allowed("internal", "audit"));
    }

    #[test]
    fn enforce_table_reports_the_qualified_name() {
        let list = Allowlist::new(strings(&["public"]), strings(&["public.users"]));

        assert!(list.enforce_table(&QualifiedTable::new("public", "users")).is_ok());

        let err = list
            .enforce_table(&QualifiedTable::new("public", "secrets"))
            .unwrap_err();
        match err {
            GatewayError::UnauthorizedTable { table } => assert_eq!(table, "public.secrets"),
            other => panic!("expected UnauthorizedTable, got {:?}", other),
        }
    }
}
