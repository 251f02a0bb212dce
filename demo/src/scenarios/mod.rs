//! Shared wiring for the demo scenarios.
//!
//! Each scenario builds a complete gateway stack over the in-memory
//! adapter: seeded dataset, allowlist, sort-key policy, audit logger on
//! stderr, and a quota engine shared across however many sessions the
//! scenario opens.

pub mod happy_path;
pub mod injection;
pub mod quota_burst;
pub mod read_only;
pub mod unauthorized_table;

use std::sync::Arc;

use chrono::{Duration, Utc};

use palisade_adapter::{MemoryAdapter, MemoryDataset, MemoryDriver};
use palisade_audit::{AuditSecret, JsonLineAuditLogger, QueryFingerprinter};
use palisade_contracts::capability::{Action, CapabilityClaims, Grant};
use palisade_contracts::error::GatewayResult;
use palisade_contracts::quota::QuotaPolicy;
use palisade_contracts::tool::{InvocationMode, ToolRequest};
use palisade_core::config::DatabaseSettings;
use palisade_core::session::fresh_session_id;
use palisade_core::traits::{Adapter, AuditSink, QuotaGate};
use palisade_core::{Gateway, SessionContext};
use palisade_quota::{QuotaEngine, QuotaEngineConfig};
use palisade_sql::{Allowlist, OrderByPolicy};

pub const DEMO_TENANT: &str = "acme";
pub const DEMO_IDENTITY: &str = "demo-agent";
pub const TRUSTED_ISSUER: &str = "launcher";

/// A fully wired gateway plus the quota engine shared by its sessions.
pub struct Stack {
    pub gateway: Gateway,
    pub quota: Arc<QuotaEngine>,
}

#[derive(Default)]
pub struct StackOptions {
    /// Explicit `schema.table` entries; empty permits any table in the
    /// allowed `public` schema.
    pub allowed_tables: Vec<String>,
    pub policies: Vec<QuotaPolicy>,
}

/// A fresh secret per run; the demo never persists or prints it.
fn ephemeral_secret() -> GatewayResult<AuditSecret> {
    let material = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    AuditSecret::from_bytes(material.into_bytes())
}

pub fn build_stack(options: StackOptions) -> GatewayResult<Stack> {
    let dataset = Arc::new(MemoryDataset::sample());
    let driver = MemoryDriver::new(Arc::clone(&dataset));
    let allowlist = Arc::new(Allowlist::new(
        vec!["public".to_string()],
        options.allowed_tables,
    ));
    let order_by = OrderByPolicy::new(vec![
        "public.users.created_at".to_string(),
        "public.orders.total".to_string(),
    ]);
    let audit = Arc::new(JsonLineAuditLogger::stderr());

    let adapter = Arc::new(MemoryAdapter::new(
        driver,
        dataset,
        allowlist,
        Some(order_by),
        QueryFingerprinter::new(ephemeral_secret()?),
        audit as Arc<dyn AuditSink>,
        &DatabaseSettings::default(),
    ));
    adapter.connect()?;

    let gateway = Gateway::new(
        adapter as Arc<dyn Adapter>,
        vec![TRUSTED_ISSUER.to_string()],
    )?;
    let quota = Arc::new(QuotaEngine::new(
        options.policies,
        QuotaEngineConfig::default(),
    ));

    Ok(Stack { gateway, quota })
}

/// Open a bound session carrying `grants` under `cap_set_id`.
pub fn open_session(
    stack: &Stack,
    cap_set_id: &str,
    grants: Vec<Grant>,
) -> GatewayResult<SessionContext> {
    let now = Utc::now();
    let session = stack.gateway.new_session();
    session.bind(DEMO_IDENTITY, DEMO_TENANT, fresh_session_id())?;
    stack.gateway.attach_capabilities_from_claims(
        &session,
        CapabilityClaims {
            cap_set_id: cap_set_id.to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            issuer: TRUSTED_ISSUER.to_string(),
            grants,
        },
    )?;
    session.attach_quota_engine(Arc::clone(&stack.quota) as Arc<dyn QuotaGate>)?;
    Ok(session)
}

pub fn invoke_grant(tool: &str) -> Grant {
    Grant {
        action: Action::ToolInvoke,
        target: tool.to_string(),
    }
}

pub fn tool_request(tool: &str, input: serde_json::Value, read_only: bool) -> ToolRequest {
    ToolRequest {
        tool_name: tool.to_string(),
        input,
        mode: InvocationMode { read_only },
        meta: serde_json::Value::Null,
    }
}

/// Print one dispatch outcome in a compact, scannable form.
pub fn print_outcome(label: &str, envelope: &serde_json::Value) {
    if envelope["ok"] == serde_json::json!(true) {
        println!("  [ok]   {label}");
    } else {
        println!(
            "  [deny] {label} -> {}",
            envelope["error"]["code"].as_str().unwrap_or("?")
        );
    }
}

/// Fail the scenario when an envelope does not carry the expected code.
pub fn expect_code(envelope: &serde_json::Value, code: &str) -> GatewayResult<()> {
    let actual = envelope["error"]["code"].as_str().unwrap_or("<ok>");
    if actual == code {
        Ok(())
    } else {
        Err(palisade_contracts::error::GatewayError::Internal {
            reason: format!("scenario expected {code}, got {actual}"),
        })
    }
}
