use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected since the previous call to [`Cache::stats`](crate::Cache::stats).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Stats {
    pub hit_count: u64,
    pub miss_count: u64,
    /// Entries removed because their TTL had passed.
    pub expiration_count: u64,
    /// Live entries removed by the usage evictor.
    pub eviction_count: u64,
    pub millis_elapsed: u128,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    expiration_count: AtomicU64,
    eviction_count: AtomicU64,
}

impl Counters {
    pub(crate) fn increment_hit_count(&self) {
        self.hit_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_miss_count(&self) {
        self.miss_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_expiration_count(&self) {
        self.expiration_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_eviction_count(&self) {
        self.eviction_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Reads and resets all counters.
    pub(crate) fn take(&self) -> Stats {
        Stats {
            hit_count: self.hit_count.swap(0, Ordering::AcqRel),
            miss_count: self.miss_count.swap(0, Ordering::AcqRel),
            expiration_count: self.expiration_count.swap(0, Ordering::AcqRel),
            eviction_count: self.eviction_count.swap(0, Ordering::AcqRel),
            millis_elapsed: 0,
        }
    }
}
