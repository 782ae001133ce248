use crate::error::CacheError;
use crate::evictor::UsageEvictor;
use crate::key_lock::{KeyGuard, KeyLock};
use crate::Stats;
use ahash::RandomState;
use entry::CacheEntry;
use janitor::Janitor;
use options::{CacheBuilder, CacheOption, MIN_TTL, Settings};
use parking_lot::{Mutex, RwLock};
use stats::Counters;
use std::collections::{HashMap, HashSet};
use std::num::NonZero;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use std::{fmt, thread};

mod entry;
mod janitor;
pub(crate) mod options;
pub(crate) mod stats;

type Shard = RwLock<HashMap<String, CacheEntry, RandomState>>;

/// A value found by [`Cache::try_get`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cached<T> {
    pub value: T,
    /// Time left until the entry expires. Always greater than zero.
    pub remaining_ttl: Duration,
}

/// Thread-safe in-memory cache whose entries expire after a per-entry TTL.
///
/// Every operation locks only the key it works on, so different keys proceed in parallel while
/// operations on the same key are serialized. In particular at most one provider of
/// [`Cache::get_or_create`] runs per key at any time.
///
/// Expired entries are dropped lazily on access and by a background janitor thread. The janitor
/// starts with the first stored value and stops again once the cache is empty. With a usage
/// evictor configured the janitor also removes the worst ranked live entries until the cache fits
/// its capacity again, so the capacity may be exceeded between two passes.
///
/// Values are stored type-erased. A key must always be used with the same value type; reading a
/// key as a different type panics.
///
/// Cloning a cache is cheap and yields a handle to the same entries.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

struct Inner {
    hash_builder: RandomState,
    shards: Vec<Shard>,
    key_lock: KeyLock<String>,
    evictor: Option<Box<dyn UsageEvictor>>,
    janitor: Janitor,
    sweep_lock: Mutex<()>,
    counters: Counters,
    stats_last_accessed: Mutex<Instant>,
}

enum Removal {
    Expired,
    Evicted,
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new()
    }
}

impl Cache {
    /// Creates a cache without usage eviction and the default janitor interval.
    pub fn new() -> Cache {
        Cache::from_settings(Settings::default())
    }

    pub fn builder() -> CacheBuilder {
        CacheBuilder::new()
    }

    /// Creates a cache and applies `options` in order.
    ///
    /// ## Panics
    /// Panics if an option is invalid, see [`CacheOption`].
    pub fn with_options<I>(options: I) -> Cache
    where
        I: IntoIterator<Item = CacheOption>,
    {
        let mut settings = Settings::default();
        for option in options {
            settings.apply(option);
        }
        Cache::from_settings(settings)
    }

    pub(crate) fn from_settings(settings: Settings) -> Cache {
        let available_parallelism = thread::available_parallelism()
            .map(NonZero::get)
            .unwrap_or(1);

        let number_of_shards = available_parallelism * 4;
        let hash_builder = RandomState::new();

        let shards = (0..number_of_shards)
            .map(|_| RwLock::new(HashMap::with_hasher(hash_builder.clone())))
            .collect();

        Cache {
            inner: Arc::new(Inner {
                hash_builder,
                shards,
                key_lock: KeyLock::new(),
                evictor: settings.evictor,
                janitor: Janitor::new(settings.janitor_interval),
                sweep_lock: Mutex::new(()),
                counters: Counters::default(),
                stats_last_accessed: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Returns the value stored for `key` together with its remaining TTL.
    ///
    /// Missing and expired entries yield [`None`]; an expired entry is removed on the way.
    ///
    /// ## Panics
    /// Panics if the value stored for `key` is not a `T`.
    pub fn try_get<T>(&self, key: &str) -> Option<Cached<T>>
    where
        T: Clone + 'static,
    {
        let inner = &*self.inner;
        let _guard = inner.key_lock.lock(key.to_owned());
        let shard = inner.shard(key);
        let now = Instant::now();

        let cached = {
            let entries = shard.read();
            let Some(entry) = entries.get(key) else {
                inner.counters.increment_miss_count();
                return None;
            };

            if entry.is_expired(now) {
                None
            } else {
                Some(Cached {
                    value: entry.value::<T>(key).clone(),
                    remaining_ttl: entry.remaining(now),
                })
            }
        };

        match cached {
            Some(cached) => {
                inner.notify_used(key);
                inner.counters.increment_hit_count();
                Some(cached)
            }
            None => {
                shard.write().remove(key);
                inner.notify_removed(key);
                inner.counters.increment_expiration_count();
                inner.counters.increment_miss_count();
                None
            }
        }
    }

    /// Returns the live value for `key`, or computes it with `provider` and stores it for `ttl`.
    ///
    /// The key stays locked while `provider` runs, so concurrent callers for the same key wait
    /// for the first one and then see its value. `provider` must not access the same key of this
    /// cache again, that would deadlock.
    ///
    /// If `provider` fails, its error is returned unchanged and any stale entry for `key` is
    /// removed. Nothing is cached in that case.
    ///
    /// ## Errors
    /// Returns [`CacheError::TtlTooShort`] without calling `provider` if `ttl` is shorter than
    /// [`MIN_TTL`](crate::MIN_TTL).
    ///
    /// ## Panics
    /// Panics if a live value stored for `key` is not a `T`.
    pub fn get_or_create<T, E, F>(&self, key: &str, ttl: Duration, provider: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        if ttl < MIN_TTL {
            return Err(CacheError::TtlTooShort { ttl, min: MIN_TTL }.into());
        }

        let inner = &*self.inner;
        let _guard = inner.key_lock.lock(key.to_owned());
        let shard = inner.shard(key);

        // `Some(None)` is an expired entry that gets replaced
        let existing = shard.read().get(key).map(|entry| {
            (!entry.is_expired(Instant::now())).then(|| entry.value::<T>(key).clone())
        });

        if let Some(Some(value)) = existing {
            inner.notify_used(key);
            inner.counters.increment_hit_count();
            return Ok(value);
        }
        let existed = existing.is_some();

        inner.counters.increment_miss_count();

        let value = match provider() {
            Ok(value) => value,
            Err(err) => {
                if existed {
                    shard.write().remove(key);
                    inner.notify_removed(key);
                }
                return Err(err);
            }
        };

        let expired_at = entry::deadline_after(Instant::now(), ttl);
        {
            let mut entries = shard.write();
            match entries.get_mut(key) {
                Some(entry) => entry.refresh(value.clone(), expired_at),
                None => {
                    entries.insert(key.to_owned(), CacheEntry::new(value.clone(), expired_at));
                }
            }
        }

        self.ensure_janitor();
        inner.notify_used(key);

        Ok(value)
    }

    /// Moves the expiry of `key` to `expired_at`. Returns whether the key was present.
    ///
    /// Extending an entry does not count as a use for the usage evictor.
    pub fn extend_until(&self, key: &str, expired_at: Instant) -> bool {
        let inner = &*self.inner;
        let _guard = inner.key_lock.lock(key.to_owned());

        match inner.shard(key).write().get_mut(key) {
            Some(entry) => {
                entry.set_expired_at(expired_at);
                true
            }
            None => false,
        }
    }

    /// Removes `key` from the cache. Returns whether the key was present.
    pub fn forgot(&self, key: &str) -> bool {
        let inner = &*self.inner;
        let _guard = inner.key_lock.lock(key.to_owned());

        let removed = inner.shard(key).write().remove(key).is_some();
        if removed {
            inner.notify_removed(key);
        }
        removed
    }

    /// Runs one janitor pass right now, independent of the background thread.
    ///
    /// Returns `true` if the cache was empty after the pass and the janitor was stopped.
    pub fn janitor_purge(&self) -> bool {
        self.inner.purge()
    }

    pub fn is_janitor_running(&self) -> bool {
        self.inner.janitor.is_running()
    }

    /// Number of stored entries, including expired ones that were not removed yet.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the counters collected since the last call and resets them.
    pub fn stats(&self) -> Stats {
        let millis_elapsed = {
            let mut guard = self.inner.stats_last_accessed.lock();
            let millis_elapsed = guard.elapsed().as_millis();
            *guard = Instant::now();
            millis_elapsed
        };

        Stats {
            millis_elapsed,
            ..self.inner.counters.take()
        }
    }

    fn ensure_janitor(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        self.inner.janitor.start(move || match weak.upgrade() {
            Some(inner) => !inner.purge(),
            None => false,
        });
    }
}

impl Inner {
    fn shard(&self, key: &str) -> &Shard {
        let hash = self.hash_builder.hash_one(key);
        &self.shards[hash as usize % self.shards.len()]
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    fn notify_used(&self, key: &str) {
        if let Some(evictor) = &self.evictor {
            evictor.used(key);
        }
    }

    fn notify_removed(&self, key: &str) {
        if let Some(evictor) = &self.evictor {
            evictor.remove(key);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// One janitor pass: drops expired entries, then evicts the worst ranked live entries until
    /// the evictor's capacity is respected. Returns `true` if the janitor was stopped because the
    /// cache is empty.
    fn purge(&self) -> bool {
        // a second pass would lock keys in a different order
        let _sweep = self.sweep_lock.lock();
        let now = Instant::now();

        let keys: Vec<String> = self
            .shards
            .iter()
            .flat_map(|shard| shard.read().keys().cloned().collect::<Vec<_>>())
            .collect();

        let mut marked: Vec<(KeyGuard<'_, String>, Removal)> = Vec::new();
        let mut has_live_entries = false;

        for key in keys {
            let guard = self.key_lock.lock(key);
            let expired = self
                .shard(guard.key())
                .read()
                .get(guard.key())
                .map(|entry| entry.is_expired(now));

            match expired {
                Some(true) => marked.push((guard, Removal::Expired)),
                Some(false) => has_live_entries = true,
                None => {}
            }
        }

        if has_live_entries {
            if let Some(evictor) = &self.evictor {
                self.mark_excess(&**evictor, &mut marked);
            }
        }

        let (mut expired, mut evicted) = (0_usize, 0_usize);
        for (guard, removal) in marked {
            let key = guard.key();
            self.shard(key).write().remove(key);
            self.notify_removed(key);

            match removal {
                Removal::Expired => {
                    expired += 1;
                    self.counters.increment_expiration_count();
                }
                Removal::Evicted => {
                    evicted += 1;
                    self.counters.increment_eviction_count();
                }
            }
        }

        let stopped = self.janitor.stop_if(|| self.len() == 0);
        tracing::trace!(expired, evicted, stopped, "janitor pass finished");
        stopped
    }

    /// Locks and marks the worst ranked keys that exceed the evictor's capacity.
    fn mark_excess<'a>(
        &'a self,
        evictor: &dyn UsageEvictor,
        marked: &mut Vec<(KeyGuard<'a, String>, Removal)>,
    ) {
        let excess = evictor.excess().saturating_sub(marked.len());
        if excess == 0 {
            return;
        }

        let already_marked: HashSet<&str, RandomState> =
            marked.iter().map(|(guard, _)| guard.key().as_str()).collect();

        // the ranking lock must be released before any key lock is taken, foreground operations
        // hold their key lock while they report usage
        let candidates: Vec<String> = evictor
            .iter_worst()
            .filter(|key| !already_marked.contains(key.as_str()))
            .take(excess)
            .collect();
        drop(already_marked);

        tracing::debug!(excess, candidates = candidates.len(), "evicting excess entries");

        for key in candidates {
            let guard = self.key_lock.lock(key);
            if self.contains(guard.key()) {
                marked.push((guard, Removal::Evicted));
            } else {
                evictor.remove(guard.key());
            }
        }
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.inner.len())
            .field("evictor", &self.inner.evictor)
            .field("janitor", &self.inner.janitor)
            .finish_non_exhaustive()
    }
}
