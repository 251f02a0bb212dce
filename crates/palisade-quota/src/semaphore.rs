//! Counted concurrency slots.
//!
//! Plain data guarded by the engine's mutex; no waiting, no fairness. A
//! failed acquire is a quota denial, not a queue.

use tracing::warn;

#[derive(Debug)]
pub(crate) struct CountingSemaphore {
    max: u64,
    in_use: u64,
}

impl CountingSemaphore {
    pub(crate) fn new(max: u64) -> Self {
        Self { max, in_use: 0 }
    }

    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.in_use < self.max {
            self.in_use += 1;
            true
        } else {
            false
        }
    }

    /// Return one slot. The count floors at zero: a spurious release is a
    /// caller bug worth logging, never an underflow.
    pub(crate) fn release(&mut self) {
        if self.in_use == 0 {
            warn!("semaphore released below zero; ignoring");
            return;
        }
        self.in_use -= 1;
    }

    pub(crate) fn in_use(&self) -> u64 {
        self.in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_up_to_max_then_refuse() {
        let mut sem = CountingSemaphore::new(2);

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        assert_eq!(sem.in_use(), 2);
    }

    #[test]
    fn release_frees_a_slot() {
        let mut sem = CountingSemaphore::new(1);

        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn release_floors_at_zero() {
        let mut sem = CountingSemaphore::new(1);

        sem.release();
        sem.release();
        assert_eq!(sem.in_use(), 0);

        // The semaphore still behaves after the spurious releases.
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }
}
