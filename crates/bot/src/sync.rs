//! Keyed async locks.
//!
//! Both the engine (per-conversation serialization) and the cart service
//! (per-owner get-or-create) need "one mutex per key" semantics: holders of
//! different keys never contend, holders of the same key serialize.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;

/// A map of lazily created async mutexes, one per key.
///
/// Locks are never removed; the key space here (active conversations,
/// cart owners) is small and bounded by the user base.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Get the mutex for `key`, creating it on first use.
    ///
    /// The returned `Arc` keeps the mutex alive while a caller holds its
    /// guard; lock acquisition happens outside the internal map lock so
    /// holders of other keys are never blocked.
    pub async fn acquire(&self, key: K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::default());
        let counter = Arc::new(Mutex::new(0_u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let lock = locks.acquire("conversation").await;
                let _guard = lock.lock().await;
                // Non-atomic read-modify-write; only safe under the keyed lock.
                let current = *counter.lock().await;
                tokio::task::yield_now().await;
                *counter.lock().await = current + 1;
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(*counter.lock().await, 8);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = KeyedLocks::default();

        let a = locks.acquire(1_i64).await;
        let _guard_a = a.lock().await;

        // Holding key 1 must not block key 2.
        let b = locks.acquire(2_i64).await;
        let guard_b = b.try_lock();
        assert!(guard_b.is_ok());
    }
}
