//! Admission control for in-flight chunk memory.

use crate::error::{Result, SiloError};
use std::pin::pin;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Process-wide memory-reservation budget with blocking acquire.
///
/// `reserve` suspends the calling task until the requested amount fits
/// under the fixed capacity. The wake policy on release is broadcast:
/// every blocked reserver re-checks, and a later arrival that happens
/// to fit can overtake an earlier one. No FIFO fairness is guaranteed.
pub struct MemoryBudget {
    capacity: u64,
    reserved: Mutex<u64>,
    freed: Notify,
}

impl MemoryBudget {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            reserved: Mutex::new(0),
            freed: Notify::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Currently reserved bytes. Exposed for logging and tests.
    pub fn reserved(&self) -> u64 {
        *self.reserved.lock().expect("budget mutex poisoned")
    }

    /// Block until `amount` bytes fit under capacity, then reserve them.
    ///
    /// A single reservation larger than the whole budget can never be
    /// satisfied and fails immediately instead of blocking forever.
    pub async fn reserve(&self, amount: u64) -> Result<()> {
        if amount > self.capacity {
            return Err(SiloError::InvalidRequest(format!(
                "reservation of {} bytes exceeds budget capacity of {} bytes",
                amount, self.capacity
            )));
        }

        loop {
            // Register for the next broadcast before checking capacity,
            // otherwise a release between the check and the await is lost.
            let mut notified = pin!(self.freed.notified());
            notified.as_mut().enable();

            {
                let mut reserved = self.reserved.lock().expect("budget mutex poisoned");
                if *reserved + amount <= self.capacity {
                    *reserved += amount;
                    return Ok(());
                }
                tracing::debug!(
                    "reservation of {} bytes waiting ({}/{} reserved)",
                    amount,
                    *reserved,
                    self.capacity
                );
            }

            notified.await;
        }
    }

    /// Return `amount` bytes to the budget and wake all blocked reservers.
    pub fn release(&self, amount: u64) {
        {
            let mut reserved = self.reserved.lock().expect("budget mutex poisoned");
            *reserved = reserved.saturating_sub(amount);
        }
        self.freed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_reserve_and_release() {
        let budget = MemoryBudget::new(100);
        budget.reserve(60).await.unwrap();
        budget.reserve(40).await.unwrap();
        assert_eq!(budget.reserved(), 100);

        budget.release(60);
        assert_eq!(budget.reserved(), 40);
        budget.release(40);
        assert_eq!(budget.reserved(), 0);
    }

    #[tokio::test]
    async fn test_oversized_reservation_rejected() {
        let budget = MemoryBudget::new(100);
        let err = budget.reserve(101).await.unwrap_err();
        assert!(matches!(err, SiloError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_reserve_blocks_until_release() {
        let budget = Arc::new(MemoryBudget::new(100));
        budget.reserve(80).await.unwrap();

        let mut blocked = tokio_test::task::spawn({
            let budget = budget.clone();
            async move { budget.reserve(50).await }
        });
        assert_pending!(blocked.poll());

        budget.release(80);
        assert!(blocked.is_woken());
        assert_ready!(blocked.poll()).unwrap();
        assert_eq!(budget.reserved(), 50);
    }

    #[tokio::test]
    async fn test_reserved_never_exceeds_capacity() {
        let budget = Arc::new(MemoryBudget::new(100));
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..16 {
            let budget = budget.clone();
            tasks.spawn(async move {
                for _ in 0..50 {
                    budget.reserve(30).await.unwrap();
                    assert!(budget.reserved() <= budget.capacity());
                    tokio::task::yield_now().await;
                    budget.release(30);
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        assert_eq!(budget.reserved(), 0);
    }
}
