//! The audit HMAC secret.
//!
//! Loaded once at process start from the trusted launcher; a missing or
//! short secret aborts startup. The value is a capability handed to the
//! fingerprinter — it never touches disk, logs, or any serialized form, and
//! its `Debug` output is redacted.

use palisade_contracts::error::{GatewayError, GatewayResult};

/// The key for the query-shape HMAC.
pub struct AuditSecret {
    bytes: Vec<u8>,
}

impl AuditSecret {
    /// Minimum accepted length in bytes.
    pub const MIN_LEN: usize = 32;

    /// Wrap raw secret bytes, enforcing the minimum length.
    pub fn from_bytes(bytes: Vec<u8>) -> GatewayResult<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(GatewayError::ConfigError {
                reason: format!("audit secret must be at least {} bytes", Self::MIN_LEN),
            });
        }
        Ok(Self { bytes })
    }

    /// The raw key material, visible only to this crate's HMAC.
    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for AuditSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuditSecret(redacted)")
    }
}
