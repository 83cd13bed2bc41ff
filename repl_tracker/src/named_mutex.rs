use std::{hash::Hash, sync::Arc};

use hashbrown::HashMap;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes async operations keyed by an arbitrary identifier, e.g. a
/// transaction id.
///
/// State transitions for a given transaction are single-writer: two
/// concurrent callers locking the same key serialize; callers locking
/// different keys never block each other. Entries are never removed — the
/// registry is sized by the number of distinct keys seen over the life of
/// the process, which for transaction ids is bounded by ingest volume, not
/// by request volume.
#[derive(Debug, Default)]
pub struct NamedMutexRegistry<K> {
    locks: SyncMutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> NamedMutexRegistry<K> {
    pub fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, creating its entry on first use.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        mutex.lock_owned().await
    }

    /// Number of distinct keys the registry has ever locked, for diagnostics.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let registry = Arc::new(NamedMutexRegistry::<u32>::new());
        let counter = Arc::new(AtomicU32::new(0));
        let overlap = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&counter);
            let overlap = Arc::clone(&overlap);
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock(42).await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                if counter.load(Ordering::SeqCst) != before + 1 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let registry = Arc::new(NamedMutexRegistry::<u32>::new());
        let g1 = registry.lock(1).await;
        let acquired = tokio::time::timeout(Duration::from_millis(100), registry.lock(2)).await;
        assert!(acquired.is_ok());
        drop(g1);
    }
}
