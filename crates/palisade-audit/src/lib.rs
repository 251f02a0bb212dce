//! # palisade-audit
//!
//! Privacy-preserving audit for the PALISADE gateway: queries are reduced
//! to a structural shape, keyed through HMAC-SHA256, and emitted as coarse
//! JSON-line events. The HMAC secret is the one true process-global in the
//! system, loaded once at startup and held here as a capability.

pub mod fingerprint;
pub mod logger;
pub mod secret;

pub use fingerprint::QueryFingerprinter;
pub use logger::JsonLineAuditLogger;
pub use secret::AuditSecret;
