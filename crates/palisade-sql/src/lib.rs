//! # palisade-sql
//!
//! The SQL gatekeepers of the PALISADE pipeline: a regex-only validator for
//! the read-only SELECT dialect, the schema/table allowlist, and the
//! enforcer gluing the two together. No AST, no dialect ambitions —
//! anything the patterns do not positively recognize is rejected, and the
//! allowlist catches whatever over-extraction lets through.

pub mod allowlist;
pub mod enforce;
pub mod orderby;
pub mod validator;

pub use allowlist::Allowlist;
pub use enforce::enforce_tables;
pub use orderby::OrderByPolicy;
pub use validator::SqlValidator;
