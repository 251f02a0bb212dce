//! Query data types: qualified table names, validator output, and the
//! read-execution request/result pair.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A schema-qualified table name.
///
/// The validator only ever extracts qualified references; an unqualified
/// table in a query is a rejection, so this type has no schema-less form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedTable {
    pub schema: String,
    pub table: String,
}

impl QualifiedTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// The validator's accepted output: the original query text plus every table
/// it references.
///
/// Over-extraction is acceptable (the allowlist rejects the excess);
/// an empty set never reaches this type — the validator fails closed first.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub query: String,
    pub tables: BTreeSet<QualifiedTable>,
}

/// Input payload of the `query_read` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Positional parameters, bound opaquely by the driver.
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    /// Requested row cap; the executor clamps it to [1, 1000].
    #[serde(default)]
    pub limit: Option<u64>,
    /// Requested statement timeout in ms; clamped to [1000, 60000].
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

/// One result-set column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Execution metadata returned alongside the rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub execution_time_ms: u64,
    /// True when the driver returned more rows than the applied cap.
    pub truncated: bool,
    /// The row cap actually enforced server-side.
    pub applied_limit: u64,
    /// The cap the caller asked for, before clamping.
    pub requested_limit: Option<u64>,
}

/// The `query_read` tool's success payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub fields: Vec<FieldInfo>,
    pub metadata: QueryMetadata,
}
