//! The tool registry: append-only descriptors with compiled input schemas.
//!
//! Registration is one-shot per name; re-registration is an error, never a
//! replacement. Input schemas are declarative JSON Schema documents whose
//! only job is to reject malformed payloads before a handler runs — they
//! know nothing about SQL. Schemas are compiled once at registration so the
//! per-invocation check is a pure lookup plus validation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use palisade_contracts::error::{GatewayError, GatewayResult};

use crate::session::SessionContext;
use crate::traits::Adapter;

/// A tool implementation. Receives the schema-validated input payload, the
/// adapter, and the (already asserted) session context.
pub type ToolHandler = Arc<
    dyn Fn(&serde_json::Value, &dyn Adapter, &SessionContext) -> GatewayResult<serde_json::Value>
        + Send
        + Sync,
>;

/// Everything needed to register one tool.
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the input payload; compiled at registration.
    pub input_schema: serde_json::Value,
    /// Statically declares whether this tool writes. The read-only gate
    /// trusts this flag, never a naming convention.
    pub mutating: bool,
    pub handler: ToolHandler,
}

/// Discovery projection of a registered tool. What `tools/list` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub mutating: bool,
}

/// A registered tool with its compiled validator.
pub struct RegisteredTool {
    info: ToolInfo,
    validator: jsonschema::Validator,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn info(&self) -> &ToolInfo {
        &self.info
    }

    pub fn mutating(&self) -> bool {
        self.info.mutating
    }

    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }

    /// Check `input` against the declared schema. The first violation is
    /// reported; the payload is the caller's own data, so naming the failing
    /// path leaks nothing.
    pub fn validate_input(&self, input: &serde_json::Value) -> GatewayResult<()> {
        if let Some(error) = self.validator.iter_errors(input).next() {
            return Err(GatewayError::InvalidInput {
                reason: format!("{} at {}", error, error.instance_path),
            });
        }
        Ok(())
    }
}

/// The append-only name → tool map.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its descriptor name, compiling the input
    /// schema. Fails on a duplicate name or an uncompilable schema.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> GatewayResult<()> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(GatewayError::Internal {
                reason: format!("tool '{}' is already registered", descriptor.name),
            });
        }

        let validator = jsonschema::validator_for(&descriptor.input_schema).map_err(|e| {
            GatewayError::ConfigError {
                reason: format!("input schema for tool '{}' is invalid: {e}", descriptor.name),
            }
        })?;

        debug!(tool = %descriptor.name, mutating = descriptor.mutating, "tool registered");

        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                info: ToolInfo {
                    name: descriptor.name,
                    description: descriptor.description,
                    input_schema: descriptor.input_schema,
                    mutating: descriptor.mutating,
                },
                validator,
                handler: descriptor.handler,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Project every descriptor for discovery.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools.values().map(|t| t.info.clone()).collect()
    }
}
