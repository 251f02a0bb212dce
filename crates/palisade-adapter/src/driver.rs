//! The driver seam: what a per-database wire driver must provide.
//!
//! Wire drivers themselves are collaborators outside this repository; the
//! gateway only needs the four-operation connection contract below. The
//! in-memory driver in [`crate::memory`] is the reference realization and
//! the test substrate.

use std::time::Duration;

use palisade_contracts::query::FieldInfo;

/// Failure kinds a driver may report. The executor maps them to wire codes;
/// any free-text detail stays in logs and never reaches a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The statement timeout elapsed.
    Timeout,
    /// The backend rejected the statement as unparsable.
    Syntax,
    /// A referenced relation or column does not exist.
    UnknownObject,
    /// The connection dropped mid-operation.
    ConnectionLost,
    /// Anything else, with backend detail for the logs.
    Other(String),
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Timeout => f.write_str("statement timeout"),
            DriverError::Syntax => f.write_str("syntax error"),
            DriverError::UnknownObject => f.write_str("unknown object"),
            DriverError::ConnectionLost => f.write_str("connection lost"),
            DriverError::Other(detail) => write!(f, "driver error: {detail}"),
        }
    }
}

/// How the backend spells its server-side row cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDialect {
    /// `... LIMIT n` appended or clamped at the end of the statement.
    TrailingLimit,
    /// `SELECT TOP n ...` injected or clamped after the projection keyword.
    LeadingTop,
}

/// Rows and column metadata as returned by the wire, before the executor's
/// post-truncation.
#[derive(Debug, Clone)]
pub struct RawQueryResult {
    pub rows: Vec<serde_json::Value>,
    pub fields: Vec<FieldInfo>,
}

/// One backend connection. Not `Sync`: a connection is used by one
/// invocation at a time and returned to the pool between uses.
pub trait DriverConnection: Send {
    /// Begin a transaction the engine itself refuses writes in (true
    /// `READ ONLY` where supported, snapshot isolation otherwise).
    fn begin_read_only(&mut self) -> Result<(), DriverError>;

    /// Arm the session statement timeout.
    fn set_statement_timeout(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// Execute `sql` with positionally bound `params`. Parameter values are
    /// opaque data; the driver must never splice them into the text.
    fn query(
        &mut self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<RawQueryResult, DriverError>;

    /// Abort the open transaction, if any. Idempotent.
    fn rollback(&mut self) -> Result<(), DriverError>;
}

/// A connection factory for one backend.
pub trait Driver: Send + Sync {
    fn dialect(&self) -> LimitDialect;

    fn open(&self) -> Result<Box<dyn DriverConnection>, DriverError>;

    /// Cheap liveness probe.
    fn ping(&self) -> Result<(), DriverError>;
}
