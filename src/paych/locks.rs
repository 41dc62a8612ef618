// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::hash::Hash;
use std::sync::Arc;

use ahash::HashMap;
use tokio::sync::OwnedMutexGuard;

/// Async mutexes keyed by `K`. An entry lives only while some caller holds
/// or waits on its lock.
pub(super) struct KeyedLocks<K> {
    locks: parking_lot::Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Default::default(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let lock = self.locks.lock().entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyedGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

pub(super) struct KeyedGuard<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        if let Some(guard) = self.guard.take() {
            let lock = Arc::clone(OwnedMutexGuard::mutex(&guard));
            drop(guard);
            // Handles are only cloned under the map lock, so the map and
            // `lock` being the last two means nobody else is waiting.
            if Arc::strong_count(&lock) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

/// Blocking counterpart of [`KeyedLocks`] for critical sections that never
/// await.
#[derive(Default)]
pub(super) struct SyncKeyedLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<parking_lot::Mutex<()>>>>,
}

impl SyncKeyedLocks {
    /// Runs `f` while holding the lock of `key`.
    pub fn with<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.locks.lock().entry(key.to_owned()).or_default().clone();
        let out = {
            let _guard = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        out
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
