//! The builtin read-oriented tools.
//!
//! Three tools ship with the gateway: `list_tables`, `describe_table`, and
//! `query_read`. Each handler is a thin shim — parse the schema-validated
//! input, delegate to the adapter, serialize the payload. All enforcement
//! lives either in the pipeline (before the handler) or in the adapter's
//! validator → allowlist → executor → audit chain (after it). Mutation
//! tools are an extension point; the core registers none.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::query::QueryRequest;

use crate::registry::ToolDescriptor;

fn to_value<T: serde::Serialize>(payload: &T) -> GatewayResult<serde_json::Value> {
    serde_json::to_value(payload).map_err(|e| GatewayError::Internal {
        reason: format!("tool payload serialization failed: {e}"),
    })
}

fn from_input<T: for<'de> Deserialize<'de>>(input: &serde_json::Value) -> GatewayResult<T> {
    serde_json::from_value(input.clone()).map_err(|e| GatewayError::InvalidInput {
        reason: format!("input does not match the tool contract: {e}"),
    })
}

#[derive(Debug, Deserialize)]
struct ListTablesInput {
    #[serde(default)]
    schema: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescribeTableInput {
    schema: String,
    table: String,
}

fn list_tables_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "list_tables".to_string(),
        description: "List visible tables, optionally within one schema".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "schema": { "type": "string", "minLength": 1 }
            },
            "additionalProperties": false
        }),
        mutating: false,
        handler: Arc::new(|input, adapter, ctx| {
            let input: ListTablesInput = from_input(input)?;
            let listing = adapter.list_tables(input.schema.as_deref(), ctx)?;
            to_value(&listing)
        }),
    }
}

fn describe_table_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "describe_table".to_string(),
        description: "Describe the columns of one allowlisted table".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["schema", "table"],
            "properties": {
                "schema": { "type": "string", "minLength": 1 },
                "table": { "type": "string", "minLength": 1 }
            },
            "additionalProperties": false
        }),
        mutating: false,
        handler: Arc::new(|input, adapter, ctx| {
            let input: DescribeTableInput = from_input(input)?;
            let description = adapter.describe_table(&input.schema, &input.table, ctx)?;
            to_value(&description)
        }),
    }
}

fn query_read_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "query_read".to_string(),
        description: "Run one read-only SELECT against the allowlisted tables".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "params": { "type": "array" },
                "limit": { "type": "integer", "minimum": 1 },
                "timeout": { "type": "integer", "minimum": 1 }
            },
            "additionalProperties": false
        }),
        mutating: false,
        handler: Arc::new(|input, adapter, ctx| {
            let request: QueryRequest = from_input(input)?;
            let outcome = adapter.execute_query(&request, ctx)?;
            to_value(&outcome)
        }),
    }
}

/// The descriptors the gateway registers at construction.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![list_tables_tool(), describe_table_tool(), query_read_tool()]
}
