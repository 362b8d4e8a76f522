//! Per-credential request serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// At most one in-flight upstream request per credential.
///
/// Slots are created lazily and live for the process lifetime. Waiters are
/// served in FIFO order, and a guard releases on drop, so a failed attempt
/// never stalls callers queued behind it.
#[derive(Debug, Default)]
pub struct RequestQueues {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RequestQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the credential's slot, waiting behind earlier callers.
    pub async fn acquire(&self, key_hash: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .entry(key_hash.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_credential_is_serialized() {
        let queues = Arc::new(RequestQueues::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queues = queues.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _slot = queues.acquire("k").await;
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_credentials_run_concurrently() {
        let queues = Arc::new(RequestQueues::new());

        let slot_a = queues.acquire("a").await;
        // Must not deadlock while "a" is held
        let slot_b = queues.acquire("b").await;
        drop(slot_a);
        drop(slot_b);
    }

    #[tokio::test]
    async fn test_slot_released_on_drop() {
        let queues = RequestQueues::new();
        {
            let _slot = queues.acquire("k").await;
        }
        // A second acquire after drop completes immediately
        let _slot = queues.acquire("k").await;
    }
}
