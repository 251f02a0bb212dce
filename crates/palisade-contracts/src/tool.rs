//! Tool invocation request shapes and the catalog tool payloads.
//!
//! The transport (JSON-RPC framing) is a collaborator: it hands the gateway a
//! structured [`ToolRequest`] and receives either a success value or an
//! [`ErrorEnvelope`](crate::error::ErrorEnvelope). Nothing in this module
//! parses wire framing.

use serde::{Deserialize, Serialize};

/// Per-invocation mode flags supplied by the hosting process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InvocationMode {
    /// When true, tools flagged as mutating are rejected before
    /// authorization runs.
    #[serde(default)]
    pub read_only: bool,
}

/// One tool invocation as consumed by the execution boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    /// The tool's input payload, validated against its declared schema
    /// before the handler runs.
    pub input: serde_json::Value,
    #[serde(default)]
    pub mode: InvocationMode,
    /// Opaque transport metadata, carried through untouched.
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// One table entry in the `list_tables` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

/// Success payload of `list_tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableListing {
    pub tables: Vec<TableRef>,
    pub count: usize,
}

/// One column in a `describe_table` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub is_primary_key: bool,
}

/// Success payload of `describe_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub column_count: usize,
}

/// Adapter health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub adapter: String,
}
