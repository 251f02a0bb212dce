//! Startup configuration.
//!
//! Two sources, both read once and frozen:
//!
//! - `GatewayConfig` — the deployment's TOML file: pool sizing, access
//!   lists, sort-key allowlist, quota bounds, read-only flag.
//! - `LaunchMaterial` — the trusted launcher's environment handoff: session
//!   identity and tenant, the audit HMAC secret, quota policy JSON, and the
//!   optional capability claims.
//!
//! Missing launcher material is fatal before any tool can be served; there
//! is no degraded mode.

use std::path::Path;

use serde::Deserialize;

use palisade_contracts::capability::CapabilityClaims;
use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_contracts::quota::QuotaPolicy;

pub const ENV_IDENTITY: &str = "PALISADE_IDENTITY";
pub const ENV_TENANT: &str = "PALISADE_TENANT";
pub const ENV_AUDIT_SECRET: &str = "PALISADE_AUDIT_SECRET";
pub const ENV_QUOTA_POLICIES: &str = "PALISADE_QUOTA_POLICIES";
pub const ENV_CAPABILITIES: &str = "PALISADE_CAPABILITIES";

/// Minimum audit secret length in bytes.
pub const MIN_AUDIT_SECRET_LEN: usize = 32;

fn default_pool_size() -> usize {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

/// Connection pool settings for the adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long `getConnection` may block before `CONNECTION_FAILED`.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Table access configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessSettings {
    /// Schemas callers may touch. Empty means deny everything.
    #[serde(default)]
    pub allowed_schemas: Vec<String>,
    /// Qualified `schema.table` entries. Empty means permit-by-schema.
    #[serde(default)]
    pub allowed_tables: Vec<String>,
    /// `schema.table.column` sort keys callers may ORDER BY. Empty means
    /// ORDER BY is rejected outright.
    #[serde(default)]
    pub order_by_columns: Vec<String>,
}

fn default_max_keys() -> usize {
    10_000
}

fn default_idle_ttl_secs() -> u64 {
    3_600
}

/// Bounds for the quota engine's keyed state.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaSettings {
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            max_keys: default_max_keys(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

fn default_read_only() -> bool {
    true
}

/// The deployment's frozen configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub access: AccessSettings,
    #[serde(default)]
    pub quota: QuotaSettings,
    /// When true, tools flagged mutating are rejected at the read-only gate.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
    /// Issuers allowed to mint wildcard capability grants.
    #[serde(default)]
    pub trusted_issuers: Vec<String>,
}

impl GatewayConfig {
    /// Parse `s` as the TOML configuration document.
    pub fn from_toml_str(s: &str) -> GatewayResult<Self> {
        toml::from_str(s).map_err(|e| GatewayError::ConfigError {
            reason: format!("failed to parse gateway config TOML: {e}"),
        })
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> GatewayResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GatewayError::ConfigError {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// The trusted launcher's environment handoff.
#[derive(Debug)]
pub struct LaunchMaterial {
    pub identity: String,
    pub tenant: String,
    /// Raw audit secret bytes, ≥ 32. Handed to the audit logger once and
    /// never logged or serialized.
    pub audit_secret: Vec<u8>,
    pub policies: Vec<QuotaPolicy>,
    /// Optional pre-verified capability claims for the session.
    pub capabilities: Option<CapabilityClaims>,
}

impl LaunchMaterial {
    /// Read the handoff from the process environment.
    ///
    /// Missing identity, tenant, or audit secret is fatal. A missing policy
    /// variable means an empty policy list (the engine then denies every
    /// quota-gated request with `POLICY_MISSING`); an unparsable one is
    /// fatal.
    pub fn from_env() -> GatewayResult<Self> {
        let identity = require_env(ENV_IDENTITY)?;
        let tenant = require_env(ENV_TENANT)?;

        let audit_secret = require_env(ENV_AUDIT_SECRET)?.into_bytes();
        if audit_secret.len() < MIN_AUDIT_SECRET_LEN {
            return Err(GatewayError::ConfigError {
                reason: format!(
                    "{ENV_AUDIT_SECRET} must be at least {MIN_AUDIT_SECRET_LEN} bytes"
                ),
            });
        }

        let policies = match std::env::var(ENV_QUOTA_POLICIES) {
            Ok(json) => {
                serde_json::from_str::<Vec<QuotaPolicy>>(&json).map_err(|e| {
                    GatewayError::ConfigError {
                        reason: format!("{ENV_QUOTA_POLICIES} is not a valid policy array: {e}"),
                    }
                })?
            }
            Err(_) => Vec::new(),
        };

        let capabilities = match std::env::var(ENV_CAPABILITIES) {
            Ok(json) => Some(serde_json::from_str::<CapabilityClaims>(&json).map_err(|e| {
                GatewayError::ConfigError {
                    reason: format!("{ENV_CAPABILITIES} is not a valid capability document: {e}"),
                }
            })?),
            Err(_) => None,
        };

        Ok(Self {
            identity,
            tenant,
            audit_secret,
            policies,
            capabilities,
        })
    }
}

fn require_env(name: &str) -> GatewayResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::ConfigError {
            reason: format!("required launcher variable {name} is missing or empty"),
        }),
    }
}
