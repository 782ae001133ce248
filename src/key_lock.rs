//! Per-key mutual exclusion.
//!
//! Every key gets its own mutex, created on the first request and dropped again once nobody holds
//! or waits for it. Operations on different keys never block each other.

use ahash::RandomState;
use lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

struct LockRecord {
    mutex: Arc<Mutex<()>>,
    waiters: usize,
}

/// Registry of lazily created per-key locks.
pub struct KeyLock<K> {
    records: Mutex<HashMap<K, LockRecord, RandomState>>,
}

impl<K> Default for KeyLock<K> {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }
}

impl<K> fmt::Debug for KeyLock<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLock")
            .field("records", &self.records.lock().len())
            .finish()
    }
}

impl<K> KeyLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until exclusive access to `key` is granted.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn lock(&self, key: K) -> KeyGuard<'_, K> {
        let mutex = {
            let mut records = self.records.lock();
            let record = records.entry(key.clone()).or_insert_with(|| LockRecord {
                mutex: Arc::new(Mutex::new(())),
                waiters: 0,
            });
            record.waiters += 1;
            Arc::clone(&record.mutex)
        };

        // the registry lock must not be held here, otherwise a waiter would block every key
        let held = mutex.lock_arc();

        KeyGuard {
            key_lock: self,
            key,
            _held: held,
        }
    }

    /// Grants exclusive access to `key` only if nobody else holds it right now.
    ///
    /// Returns `None` without blocking otherwise. A failed attempt leaves the registry as it was.
    pub fn try_lock(&self, key: K) -> Option<KeyGuard<'_, K>> {
        let mut records = self.records.lock();
        let record = records.entry(key.clone()).or_insert_with(|| LockRecord {
            mutex: Arc::new(Mutex::new(())),
            waiters: 0,
        });

        // a fresh record is always free, so a miss never leaves an empty record behind
        let held = record.mutex.try_lock_arc()?;
        record.waiters += 1;
        drop(records);

        Some(KeyGuard {
            key_lock: self,
            key,
            _held: held,
        })
    }

    /// Number of keys that are currently locked or waited for.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decrements the waiter count of `key` and forgets its record once nobody needs it anymore.
    ///
    /// ## Panics
    /// Panics if `key` has no live record, which means lock and unlock calls don't match up.
    fn unlock(&self, key: &K) {
        let mut records = self.records.lock();

        let Some(record) = records.get_mut(key) else {
            drop(records);
            panic!("keylock: unlock of unlocked key");
        };

        record.waiters -= 1;
        if record.waiters == 0 {
            records.remove(key);
        }
    }
}

/// Exclusive access to one key of a [`KeyLock`].
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    key_lock: &'a KeyLock<K>,
    key: K,
    _held: ArcMutexGuard<RawMutex, ()>,
}

impl<K> KeyGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> fmt::Debug for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // the record goes first, the per-key mutex is released afterwards together with `_held`
        self.key_lock.unlock(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn it_removes_records_after_unlock() {
        // given
        let key_lock = KeyLock::new();

        // when
        let guard = key_lock.lock("key1");
        assert_eq!(key_lock.len(), 1);
        drop(guard);

        // then
        assert!(key_lock.is_empty());
    }

    #[test]
    fn it_relocks_the_same_key() {
        // given
        let key_lock = KeyLock::new();

        // when
        drop(key_lock.lock("key1"));
        let guard = key_lock.lock("key1");

        // then
        assert_eq!(guard.key(), &"key1");
        assert_eq!(key_lock.len(), 1);
    }

    #[test]
    #[should_panic(expected = "keylock: unlock of unlocked key")]
    fn it_panics_on_unlock_of_unlocked_key() {
        // given
        let key_lock: KeyLock<&str> = KeyLock::new();

        // when
        key_lock.unlock(&"never-locked");
    }

    #[test]
    fn it_fails_to_try_lock_a_held_key() {
        // given
        let key_lock = KeyLock::new();
        let guard = key_lock.lock("key1");

        // when
        let attempt = key_lock.try_lock("key1");

        // then
        assert!(attempt.is_none());
        assert_eq!(key_lock.len(), 1);
        drop(guard);
        assert!(key_lock.is_empty());
    }

    #[test]
    fn it_try_locks_a_free_key() {
        // given
        let key_lock = KeyLock::new();
        let _other = key_lock.lock("key2");

        // when
        let guard = key_lock.try_lock("key1");

        // then
        assert_eq!(guard.as_ref().map(KeyGuard::key), Some(&"key1"));
        assert_eq!(key_lock.len(), 2);
        assert!(key_lock.try_lock("key1").is_none());
        drop(guard);
        assert!(key_lock.try_lock("key1").is_some());
        assert_eq!(key_lock.len(), 1);
    }

    #[test]
    fn it_does_not_block_different_keys() {
        // given
        let key_lock = Arc::new(KeyLock::new());
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let key_lock_clone = Arc::clone(&key_lock);
        let holder = thread::spawn(move || {
            let _guard = key_lock_clone.lock(String::from("a"));
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        locked_rx.recv().unwrap();

        // when
        let guard = key_lock.lock(String::from("b"));

        // then
        assert_eq!(key_lock.len(), 2);
        drop(guard);
        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(key_lock.is_empty());
    }

    #[test]
    fn it_serializes_the_same_key() {
        // given
        let key_lock = Arc::new(KeyLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        // when
        for _ in 0..8 {
            let key_lock = Arc::clone(&key_lock);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    let _guard = key_lock.lock("shared");
                    let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now_inside, Ordering::SeqCst);
                    thread::sleep(Duration::from_micros(50));
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // then
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(key_lock.is_empty());
    }
}
