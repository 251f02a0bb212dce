//! # palisade-contracts
//!
//! Shared types, schemas, and contracts for the PALISADE gateway.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, match predicates, and error types.

pub mod audit;
pub mod capability;
pub mod error;
pub mod query;
pub mod quota;
pub mod tool;
