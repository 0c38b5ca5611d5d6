//! Tool Concurrency Limiter (`spec.md` §4.3).

use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds the number of tool calls executing concurrently.
///
/// Constructed from a capacity. Zero or negative capacity means "no
/// limiter" — the engine serializes tool calls on its own and every
/// `acquire` resolves immediately. This mirrors `neuron-tool`'s
/// preference for a null-object over an `Option<Limiter>` at call
/// sites: callers always hold a permit guard, whether or not limiting
/// is actually in effect.
pub struct Limiter {
    semaphore: Option<Semaphore>,
}

impl Limiter {
    /// Create a limiter with the given capacity. `capacity <= 0` yields
    /// an unbounded (no-op) limiter.
    pub fn new(capacity: i64) -> Self {
        if capacity <= 0 {
            Self { semaphore: None }
        } else {
            Self {
                semaphore: Some(Semaphore::new(capacity as usize)),
            }
        }
    }

    /// Acquire a slot, suspending until one is available. Cancellation
    /// is the caller's responsibility via `tokio::select!` around this
    /// future — the semaphore's own `acquire` is already cancel-safe.
    pub async fn acquire(&self) -> Permit<'_> {
        match &self.semaphore {
            Some(sem) => Permit::Bounded(
                sem.acquire()
                    .await
                    .expect("Limiter's semaphore is never closed"),
            ),
            None => Permit::Unbounded,
        }
    }
}

/// A held slot. Dropping it releases the slot back to the limiter.
pub enum Permit<'a> {
    /// A real permit from a bounded limiter.
    Bounded(SemaphorePermit<'a>),
    /// No-op permit from an unbounded limiter.
    Unbounded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn unbounded_limiter_never_blocks() {
        let limiter = Limiter::new(0);
        let _a = limiter.acquire().await;
        let _b = limiter.acquire().await;
    }

    #[tokio::test]
    async fn bounded_limiter_enforces_capacity() {
        let limiter = Arc::new(Limiter::new(1));
        let _permit = limiter.acquire().await;

        let limiter2 = Arc::clone(&limiter);
        let blocked = tokio::spawn(async move {
            tokio::time::timeout(Duration::from_millis(50), limiter2.acquire())
                .await
                .is_err()
        });
        assert!(blocked.await.unwrap());
    }

    #[tokio::test]
    async fn releasing_a_permit_unblocks_waiters() {
        let limiter = Arc::new(Limiter::new(1));
        {
            let _permit = limiter.acquire().await;
        }
        let acquired = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(acquired.is_ok());
    }
}
