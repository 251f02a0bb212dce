//! The in-memory backend: reference driver and seed dataset.
//!
//! Serves two roles: the demo's working backend and the test substrate for
//! the guarded execution path. The driver honors the rewritten `LIMIT` the
//! way a real engine would (switchable off to exercise post-truncation) and
//! supports one-shot failure injection for rollback and error-mapping
//! tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::json;

use palisade_contracts::query::FieldInfo;
use palisade_contracts::tool::ColumnInfo;

use crate::driver::{Driver, DriverConnection, DriverError, LimitDialect, RawQueryResult};

/// One table's schema and contents.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<serde_json::Value>,
}

/// The tables a memory driver serves.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    tables: Vec<MemoryTable>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn tables(&self) -> &[MemoryTable] {
        &self.tables
    }

    pub fn find(&self, schema: &str, name: &str) -> Option<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
    }

    /// The seed dataset used by the demo and the adapter tests: a customer
    /// directory, an order ledger, and a deliberately sensitive table that
    /// allowlists are expected to fence off.
    pub fn sample() -> Self {
        fn column(name: &str, data_type: &str, nullable: bool, pk: bool) -> ColumnInfo {
            ColumnInfo {
                name: name.to_string(),
                data_type: data_type.to_string(),
                nullable,
                default: None,
                is_primary_key: pk,
            }
        }

        Self::new()
            .with_table(MemoryTable {
                schema: "public".to_string(),
                name: "users".to_string(),
                columns: vec![
                    column("id", "integer", false, true),
                    column("name", "text", false, false),
                    column("email", "text", true, false),
                    column("created_at", "timestamptz", false, false),
                ],
                rows: vec![
                    json!({ "id": 1, "name": "Ada Lovelace", "email": "ada@example.com", "created_at": "2024-01-12T09:00:00Z" }),
                    json!({ "id": 2, "name": "Grace Hopper", "email": "grace@example.com", "created_at": "2024-02-03T14:30:00Z" }),
                    json!({ "id": 3, "name": "Edsger Dijkstra", "email": null, "created_at": "2024-03-21T08:15:00Z" }),
                    json!({ "id": 4, "name": "Barbara Liskov", "email": "barbara@example.com", "created_at": "2024-05-09T17:45:00Z" }),
                ],
            })
            .with_table(MemoryTable {
                schema: "public".to_string(),
                name: "orders".to_string(),
                columns: vec![
                    column("id", "integer", false, true),
                    column("user_id", "integer", false, false),
                    column("total", "numeric", false, false),
                ],
                rows: vec![
                    json!({ "id": 10, "user_id": 1, "total": 99.5 }),
                    json!({ "id": 11, "user_id": 1, "total": 12.0 }),
                    json!({ "id": 12, "user_id": 2, "total": 250.0 }),
                    json!({ "id": 13, "user_id": 4, "total": 42.9 }),
                    json!({ "id": 14, "user_id": 4, "total": 7.25 }),
                ],
            })
            .with_table(MemoryTable {
                schema: "public".to_string(),
                name: "secrets".to_string(),
                columns: vec![
                    column("id", "integer", false, true),
                    column("value", "text", false, false),
                ],
                rows: vec![json!({ "id": 1, "value": "do-not-read" })],
            })
    }
}

fn from_table_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bFROM\s+([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static regex")
    })
}

fn trailing_limit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)\s*$").expect("static regex"))
}

/// The reference in-memory driver.
pub struct MemoryDriver {
    dataset: Arc<MemoryDataset>,
    honor_limit: bool,
    fail_next: Arc<Mutex<Option<DriverError>>>,
    queries: Arc<AtomicU32>,
}

impl MemoryDriver {
    pub fn new(dataset: Arc<MemoryDataset>) -> Arc<Self> {
        Arc::new(Self {
            dataset,
            honor_limit: true,
            fail_next: Arc::new(Mutex::new(None)),
            queries: Arc::new(AtomicU32::new(0)),
        })
    }

    /// A driver that ignores the rewritten row cap, for exercising the
    /// executor's post-truncation.
    pub fn ignoring_limit(dataset: Arc<MemoryDataset>) -> Arc<Self> {
        Arc::new(Self {
            dataset,
            honor_limit: false,
            fail_next: Arc::new(Mutex::new(None)),
            queries: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Make the next `query` call fail with `error`.
    pub fn inject_failure(&self, error: DriverError) {
        *self.fail_next.lock().expect("fail_next lock poisoned") = Some(error);
    }

    /// How many statements reached the backend.
    pub fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Driver for MemoryDriver {
    fn dialect(&self) -> LimitDialect {
        LimitDialect::TrailingLimit
    }

    fn open(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        Ok(Box::new(MemoryConnection {
            dataset: Arc::clone(&self.dataset),
            honor_limit: self.honor_limit,
            fail_next: Arc::clone(&self.fail_next),
            queries: Arc::clone(&self.queries),
            in_txn: false,
        }))
    }

    fn ping(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct MemoryConnection {
    dataset: Arc<MemoryDataset>,
    honor_limit: bool,
    fail_next: Arc<Mutex<Option<DriverError>>>,
    queries: Arc<AtomicU32>,
    in_txn: bool,
}

impl DriverConnection for MemoryConnection {
    fn begin_read_only(&mut self) -> Result<(), DriverError> {
        self.in_txn = true;
        Ok(())
    }

    fn set_statement_timeout(&mut self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    fn query(
        &mut self,
        sql: &str,
        _params: &[serde_json::Value],
    ) -> Result<RawQueryResult, DriverError> {
        if let Some(error) = self.fail_next.lock().expect("fail_next lock poisoned").take() {
            return Err(error);
        }

        self.queries.fetch_add(1, Ordering::SeqCst);

        let caps = from_table_pattern()
            .captures(sql)
            .ok_or_else(|| DriverError::Syntax)?;
        let table = self
            .dataset
            .find(&caps[1], &caps[2])
            .ok_or(DriverError::UnknownObject)?;

        let mut rows = table.rows.clone();
        if self.honor_limit {
            if let Some(limit) = trailing_limit_pattern()
                .captures(sql)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
            {
                rows.truncate(limit);
            }
        }

        let fields = table
            .columns
            .iter()
            .map(|c| FieldInfo {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
            })
            .collect();

        Ok(RawQueryResult { rows, fields })
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.in_txn = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_dataset_resolves_tables() {
        let dataset = MemoryDataset::sample();
        assert!(dataset.find("public", "users").is_some());
        assert!(dataset.find("public", "orders").is_some());
        assert!(dataset.find("public", "missing").is_none());
        assert!(dataset.find("internal", "users").is_none());
    }

    #[test]
    fn driver_serves_rows_and_honors_the_limit() {
        let driver = MemoryDriver::new(Arc::new(MemoryDataset::sample()));
        let mut conn = driver.open().unwrap();

        let result = conn
            .query("SELECT id FROM public.users LIMIT 2", &[])
            .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.fields.iter().any(|f| f.name == "id"));
    }

    #[test]
    fn limit_ignoring_driver_returns_everything() {
        let driver = MemoryDriver::ignoring_limit(Arc::new(MemoryDataset::sample()));
        let mut conn = driver.open().unwrap();

        let result = conn
            .query("SELECT id FROM public.users LIMIT 2", &[])
            .unwrap();
        assert_eq!(result.rows.len(), 4);
    }

    #[test]
    fn unknown_table_is_an_unknown_object() {
        let driver = MemoryDriver::new(Arc::new(MemoryDataset::sample()));
        let mut conn = driver.open().unwrap();

        let err = conn
            .query("SELECT id FROM public.nope", &[])
            .unwrap_err();
        assert_eq!(err, DriverError::UnknownObject);
    }

    #[test]
    fn injected_failure_fires_once() {
        let driver = MemoryDriver::new(Arc::new(MemoryDataset::sample()));
        driver.inject_failure(DriverError::Timeout);
        let mut conn = driver.open().unwrap();

        let err = conn.query("SELECT id FROM public.users", &[]).unwrap_err();
        assert_eq!(err, DriverError::Timeout);

        // The next statement is healthy again.
        conn.query("SELECT id FROM public.users", &[]).unwrap();
        assert_eq!(driver.query_count(), 1);
    }
}
