//! The fail-closed audit event writer.
//!
//! One JSON line per event, written sequentially to the sink under a mutex.
//! A write or flush failure propagates as `AuditFailure` — callers treat
//! the guarded operation as failed even when the database work succeeded.

use std::io::Write;
use std::sync::Mutex;

use tracing::debug;

use palisade_contracts::audit::QueryAuditEvent;
use palisade_contracts::error::{GatewayError, GatewayResult};
use palisade_core::traits::AuditSink;

/// Serializes each event to one JSON line on the given sink.
pub struct JsonLineAuditLogger {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineAuditLogger {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// A logger writing to stderr, keeping stdout free for the transport.
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl AuditSink for JsonLineAuditLogger {
    fn emit(&self, event: &QueryAuditEvent) -> GatewayResult<()> {
        let line = serde_json::to_string(event).map_err(|e| GatewayError::AuditFailure {
            reason: format!("event serialization failed: {e}"),
        })?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| GatewayError::AuditFailure {
                reason: "audit writer lock poisoned".to_string(),
            })?;

        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|e| GatewayError::AuditFailure {
                reason: format!("audit sink write failed: {e}"),
            })?;

        debug!(result_type = ?event.result_type, "audit event emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    use palisade_contracts::audit::AuditResultType;

    /// A sink that appends to a shared buffer.
    #[derive(Clone)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// A sink that refuses every write.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("sink unavailable"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("sink unavailable"))
        }
    }

    fn event(result_type: AuditResultType, timing: Option<u64>) -> QueryAuditEvent {
        QueryAuditEvent::new("memory", result_type, "deadbeef", timing)
    }

    #[test]
    fn emits_one_json_line_per_event() {
        let buf = SharedBuf(Arc::new(StdMutex::new(vec![])));
        let logger = JsonLineAuditLogger::new(Box::new(buf.clone()));

        logger.emit(&event(AuditResultType::Validated, None)).unwrap();
        logger.emit(&event(AuditResultType::Success, Some(42))).unwrap();

        let contents = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = contents.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["result_type"], serde_json::json!("validated"));
        assert_eq!(first["adapter"], serde_json::json!("memory"));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        // 42 rounded to the nearest 10 ms at construction.
        assert_eq!(second["execution_time_ms"], serde_json::json!(40));
    }

    #[test]
    fn events_never_contain_query_text_fields() {
        let buf = SharedBuf(Arc::new(StdMutex::new(vec![])));
        let logger = JsonLineAuditLogger::new(Box::new(buf.clone()));

        logger.emit(&event(AuditResultType::Rejected, None)).unwrap();

        let contents = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(contents.trim_end()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();

        for forbidden in ["query", "sql", "params", "rows", "schema", "table", "identity"] {
            assert!(!keys.contains(&forbidden), "forbidden field {forbidden}");
        }
    }

    #[test]
    fn write_failure_is_an_audit_failure() {
        let logger = JsonLineAuditLogger::new(Box::new(BrokenSink));

        let err = logger
            .emit(&event(AuditResultType::Success, Some(10)))
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuditFailure { .. }));
    }
}
