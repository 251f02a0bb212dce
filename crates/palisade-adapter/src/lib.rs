//! # palisade-adapter
//!
//! Backend realization for the PALISADE gateway: the driver seam a wire
//! driver plugs into, the bounded connection pool, the safe-read executor
//! with its row-cap rewrite and mandatory rollback, and the in-memory
//! reference adapter that wires validator, allowlist, executor, and audit
//! into the adapter contract.

pub mod adapter;
pub mod driver;
pub mod executor;
pub mod memory;
pub mod pool;

pub use adapter::MemoryAdapter;
pub use driver::{Driver, DriverConnection, DriverError, LimitDialect};
pub use executor::SafeReadExecutor;
pub use memory::{MemoryDataset, MemoryDriver, MemoryTable};
pub use pool::ConnectionPool;
