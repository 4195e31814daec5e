//! Per-key async mutexes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

/// A set of async mutexes addressed by string key.
///
/// Used for per-row mutation locks and per-cursor fetch locks. Entries are
/// created on demand and dropped again once nobody holds or waits on them.
///
/// # Example
///
/// ```
/// use kgrid_lib::overlay::KeyedLocks;
///
/// let locks = KeyedLocks::new();
/// let guard = locks.try_lock_all(["row-1"]).unwrap();
/// assert!(locks.is_locked("row-1"));
/// assert!(locks.try_lock_all(["row-1"]).is_none());
/// drop(guard);
/// assert!(!locks.is_locked("row-1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Holds one or more keys of a [`KeyedLocks`] until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<String>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn sorted_keys<I, K>(keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Acquires every key, waiting as needed.
    ///
    /// Keys are taken in sorted order so two overlapping batches cannot
    /// deadlock.
    pub async fn lock_all<I, K>(&self, keys: I) -> KeyGuard
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = Self::sorted_keys(keys);
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.entry(key).lock_owned().await);
        }
        KeyGuard {
            guards,
            keys,
            locks: self.locks.clone(),
        }
    }

    /// Acquires every key without waiting, or none of them.
    pub fn try_lock_all<I, K>(&self, keys: I) -> Option<KeyGuard>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = Self::sorted_keys(keys);
        let mut guard = KeyGuard {
            guards: Vec::with_capacity(keys.len()),
            keys: Vec::with_capacity(keys.len()),
            locks: self.locks.clone(),
        };
        for key in keys {
            let held = self.entry(&key).try_lock_owned().ok();
            // Record the key before bailing so Drop prunes the fresh entry.
            guard.keys.push(key);
            guard.guards.push(held?);
        }
        Some(guard)
    }

    /// Returns `true` if someone currently holds `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .is_some_and(|m| m.try_lock().is_err())
    }
}

impl KeyGuard {
    /// Returns the held keys, sorted.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            self.locks
                .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_lock_all_is_all_or_nothing() {
        let locks = KeyedLocks::new();
        let held = locks.lock_all(["b"]).await;

        assert!(locks.try_lock_all(["a", "b"]).is_none());
        assert!(!locks.is_locked("a"));

        drop(held);
        let both = locks.try_lock_all(["b", "a", "a"]).unwrap();
        assert_eq!(both.keys(), ["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let locks = KeyedLocks::new();
        let first = locks.lock_all(["row"]).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock_all(["row"]).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert!(!locks.is_locked("row"));
    }
}
