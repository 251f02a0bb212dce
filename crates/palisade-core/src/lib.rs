//! # palisade-core
//!
//! The execution boundary of the PALISADE gateway: the session model, the
//! capability authorizer, the tool registry, and the `Gateway` value that
//! orders them into the one pipeline every tool invocation traverses.
//! Backend access and quota accounting are trait seams (`Adapter`,
//! `QuotaGate`, `AuditSink`) realized by the sibling crates.

pub mod authz;
pub mod config;
pub mod gateway;
pub mod registry;
pub mod session;
pub mod tools;
pub mod traits;

pub use gateway::Gateway;
pub use session::SessionContext;
