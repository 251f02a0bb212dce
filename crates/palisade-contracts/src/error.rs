//! Gateway error types and the wire error envelope.
//!
//! All fallible operations in the PALISADE pipeline return `GatewayResult<T>`.
//! Every error variant maps to exactly one code from the closed wire set via
//! [`GatewayError::code`], and renders to the `{ok: false, error: {...}}`
//! envelope via [`ErrorEnvelope::from_error`].
//!
//! Message hygiene is a hard rule: user-visible `message` strings never carry
//! SQL text, identifier names, row contents, or driver messages. Specifics a
//! client can act on (the rejected tool name, the denied table) ride in the
//! structured `details` field instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for the PALISADE gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The session context is unbound, double-bound, or otherwise violated
    /// its one-shot lifecycle.
    #[error("session context security violation: {reason}")]
    SecurityViolation { reason: String },

    /// The requested tool is not present in the registry.
    #[error("requested tool is not registered")]
    ToolNotFound { tool: String },

    /// A mutating tool was invoked while the gateway runs in read-only mode.
    #[error("mutating tools are disabled in read-only mode")]
    ReadOnlyMode { tool: String },

    /// The capability evaluation denied the invocation.
    #[error("invocation not authorized: {reason}")]
    Unauthorized { reason: String },

    /// The quota engine denied the invocation.
    #[error("quota exceeded: {reason}")]
    RateLimited { reason: String },

    /// The tool input payload failed its declared input schema.
    #[error("tool input failed schema validation")]
    InvalidInput { reason: String },

    /// The SQL validator rejected the query text.
    #[error("query rejected by the read-only SQL dialect")]
    QueryRejected { reason: String },

    /// The SQL validator could not extract any table reference; the query is
    /// rejected fail-closed.
    #[error("query could not be validated")]
    InvalidQuery { reason: String },

    /// A referenced table is outside the configured allowlist.
    #[error("access to a table outside the allowlist was denied")]
    UnauthorizedTable { table: String },

    /// The statement timeout elapsed before the backend returned.
    #[error("query execution timed out")]
    Timeout,

    /// No connection could be obtained from the pool.
    #[error("backend connection unavailable")]
    ConnectionFailed { reason: String },

    /// The backend rejected the statement as syntactically invalid.
    #[error("backend rejected the statement syntax")]
    SyntaxError,

    /// The backend does not know a referenced object.
    #[error("referenced database object does not exist")]
    ObjectNotFound,

    /// Any other backend execution failure.
    #[error("query execution failed")]
    ExecutionError,

    /// An audit event could not be emitted. Fail-closed: the operation that
    /// triggered the event is treated as failed.
    #[error("audit emission failed: {reason}")]
    AuditFailure { reason: String },

    /// A required configuration value is missing or invalid. Fatal at
    /// startup, never surfaced through the tool envelope.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Catch-all for invariant breaks that have no dedicated variant.
    #[error("internal gateway error: {reason}")]
    Internal { reason: String },
}

/// Convenience alias used throughout the PALISADE crates.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The closed set of wire error codes from the external interface contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SessionContextInvalid,
    ToolNotFound,
    ReadOnly,
    Unauthorized,
    RateLimited,
    ValidationError,
    QueryRejected,
    InvalidQuery,
    UnauthorizedTable,
    Timeout,
    ConnectionFailed,
    SyntaxError,
    ObjectNotFound,
    ExecutionError,
    AuditFailure,
    InternalError,
}

impl ErrorCode {
    /// The wire spelling of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SessionContextInvalid => "SESSION_CONTEXT_INVALID",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ReadOnly => "READ_ONLY",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::QueryRejected => "QUERY_REJECTED",
            ErrorCode::InvalidQuery => "INVALID_QUERY",
            ErrorCode::UnauthorizedTable => "UNAUTHORIZED_TABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::ObjectNotFound => "OBJECT_NOT_FOUND",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
            ErrorCode::AuditFailure => "AUDIT_FAILURE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// Map this error to its wire code.
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::SecurityViolation { .. } => ErrorCode::SessionContextInvalid,
            GatewayError::ToolNotFound { .. } => ErrorCode::ToolNotFound,
            GatewayError::ReadOnlyMode { .. } => ErrorCode::ReadOnly,
            GatewayError::Unauthorized { .. } => ErrorCode::Unauthorized,
            GatewayError::RateLimited { .. } => ErrorCode::RateLimited,
            GatewayError::InvalidInput { .. } => ErrorCode::ValidationError,
            GatewayError::QueryRejected { .. } => ErrorCode::QueryRejected,
            GatewayError::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            GatewayError::UnauthorizedTable { .. } => ErrorCode::UnauthorizedTable,
            GatewayError::Timeout => ErrorCode::Timeout,
            GatewayError::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            GatewayError::SyntaxError => ErrorCode::SyntaxError,
            GatewayError::ObjectNotFound => ErrorCode::ObjectNotFound,
            GatewayError::ExecutionError => ErrorCode::ExecutionError,
            GatewayError::AuditFailure { .. } => ErrorCode::AuditFailure,
            GatewayError::ConfigError { .. } => ErrorCode::InternalError,
            GatewayError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Structured specifics safe to hand to the caller.
    ///
    /// Identifiers a client legitimately needs (the tool it asked for, the
    /// table it was denied) appear here and only here.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GatewayError::ToolNotFound { tool } | GatewayError::ReadOnlyMode { tool } => {
                Some(serde_json::json!({ "tool": tool }))
            }
            GatewayError::Unauthorized { reason }
            | GatewayError::RateLimited { reason }
            | GatewayError::InvalidInput { reason }
            | GatewayError::QueryRejected { reason }
            | GatewayError::InvalidQuery { reason } => {
                Some(serde_json::json!({ "reason": reason }))
            }
            GatewayError::UnauthorizedTable { table } => {
                Some(serde_json::json!({ "table": table }))
            }
            _ => None,
        }
    }
}

/// The body of a failed tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// One of the closed wire codes.
    pub code: String,
    /// Sanitized human-readable message.
    pub message: String,
    /// Structured specifics, when the error carries any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The `{ok: false, error: {...}}` half of the tool result contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Render a `GatewayError` into the wire envelope.
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            ok: false,
            error: ErrorBody {
                code: err.code().as_str().to_string(),
                message: err.to_string(),
                details: err.details(),
            },
        }
    }
}
