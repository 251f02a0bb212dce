//! A bounded connection pool over the driver seam.
//!
//! Connections are opened lazily up to `max_size` and handed out behind a
//! guard that returns them on drop. Acquisition blocks (on a condvar) up to
//! the configured timeout, then surfaces `CONNECTION_FAILED`. Connections
//! return to the pool on every path — the executor's unconditional rollback
//! runs before the guard drops.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use palisade_contracts::error::{GatewayError, GatewayResult};

use crate::driver::{Driver, DriverConnection};

struct PoolState {
    idle: Vec<Box<dyn DriverConnection>>,
    /// Connections alive (idle + checked out).
    total: usize,
}

pub struct ConnectionPool {
    driver: std::sync::Arc<dyn Driver>,
    max_size: usize,
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    pub fn new(
        driver: std::sync::Arc<dyn Driver>,
        max_size: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            max_size: max_size.max(1),
            acquire_timeout,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Check a connection out, waiting up to the acquire timeout.
    pub fn acquire(&self) -> GatewayResult<PooledConnection<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::ConnectionFailed {
                reason: "pool lock poisoned".to_string(),
            })?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }

            if state.total < self.max_size {
                state.total += 1;
                drop(state);

                match self.driver.open() {
                    Ok(conn) => {
                        debug!("opened new pooled connection");
                        return Ok(PooledConnection {
                            pool: self,
                            conn: Some(conn),
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "driver failed to open a connection");
                        if let Ok(mut state) = self.state.lock() {
                            state.total -= 1;
                        }
                        self.available.notify_one();
                        return Err(GatewayError::ConnectionFailed {
                            reason: "backend connection could not be opened".to_string(),
                        });
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GatewayError::ConnectionFailed {
                    reason: "timed out waiting for a pooled connection".to_string(),
                });
            }

            let (next, timeout) = self
                .available
                .wait_timeout(state, remaining)
                .map_err(|_| GatewayError::ConnectionFailed {
                    reason: "pool lock poisoned".to_string(),
                })?;
            state = next;
            if timeout.timed_out() && state.idle.is_empty() && state.total >= self.max_size {
                return Err(GatewayError::ConnectionFailed {
                    reason: "timed out waiting for a pooled connection".to_string(),
                });
            }
        }
    }

    fn give_back(&self, conn: Box<dyn DriverConnection>) {
        if let Ok(mut state) = self.state.lock() {
            state.idle.push(conn);
        }
        self.available.notify_one();
    }
}

/// A checked-out connection; returns to the pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Box<dyn DriverConnection>>,
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl PooledConnection<'_> {
    pub fn as_mut(&mut self) -> &mut dyn DriverConnection {
        self.conn
            .as_mut()
            .expect("connection present until drop")
            .as_mut()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverError, LimitDialect, RawQueryResult};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct StubConnection;

    impl DriverConnection for StubConnection {
        fn begin_read_only(&mut self) -> Result<(), DriverError> {
            Ok(())
        }

        fn set_statement_timeout(&mut self, _timeout: Duration) -> Result<(), DriverError> {
            Ok(())
        }

        fn query(
            &mut self,
            _sql: &str,
            _params: &[serde_json::Value],
        ) -> Result<RawQueryResult, DriverError> {
            Ok(RawQueryResult {
                rows: vec![],
                fields: vec![],
            })
        }

        fn rollback(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    struct StubDriver {
        opened: AtomicU32,
        fail_open: bool,
    }

    impl StubDriver {
        fn new(fail_open: bool) -> Arc<Self> {
            Arc::new(Self {
                opened: AtomicU32::new(0),
                fail_open,
            })
        }
    }

    impl Driver for StubDriver {
        fn dialect(&self) -> LimitDialect {
            LimitDialect::TrailingLimit
        }

        fn open(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
            if self.fail_open {
                return Err(DriverError::ConnectionLost);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubConnection))
        }

        fn ping(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    #[test]
    fn connections_are_reused_after_return() {
        let driver = StubDriver::new(false);
        let pool = ConnectionPool::new(
            Arc::clone(&driver) as Arc<dyn Driver>,
            2,
            Duration::from_millis(50),
        );

        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
        } // both returned here

        let _c = pool.acquire().unwrap();
        let _d = pool.acquire().unwrap();

        assert_eq!(driver.opened.load(Ordering::SeqCst), 2, "no third open");
    }

    #[test]
    fn exhausted_pool_times_out_with_connection_failed() {
        let driver = StubDriver::new(false);
        let pool = ConnectionPool::new(
            Arc::clone(&driver) as Arc<dyn Driver>,
            1,
            Duration::from_millis(20),
        );

        let _held = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionFailed { .. }));
    }

    #[test]
    fn failed_open_surfaces_connection_failed_and_frees_the_slot() {
        let driver = StubDriver::new(true);
        let pool = ConnectionPool::new(
            Arc::clone(&driver) as Arc<dyn Driver>,
            1,
            Duration::from_millis(20),
        );

        assert!(matches!(
            pool.acquire().unwrap_err(),
            GatewayError::ConnectionFailed { .. }
        ));
        // The slot was not leaked: a second attempt still tries to open
        // rather than waiting for a phantom connection.
        assert!(matches!(
            pool.acquire().unwrap_err(),
            GatewayError::ConnectionFailed { .. }
        ));
    }

    #[test]
    fn waiting_acquirer_wakes_when_a_connection_returns() {
        let driver = StubDriver::new(false);
        let pool = Arc::new(ConnectionPool::new(
            Arc::clone(&driver) as Arc<dyn Driver>,
            1,
            Duration::from_millis(500),
        ));

        let held = pool.acquire().unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.acquire().map(|_| ()))
        };

        std::thread::sleep(Duration::from_millis(30));
        drop(held);

        waiter.join().unwrap().unwrap();
    }
}
