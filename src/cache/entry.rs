use std::any::{self, Any};
use std::fmt;
use std::time::{Duration, Instant};

/// Returns `now + ttl`, or the latest representable instant on the way there if that overflows.
pub(crate) fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    let mut ttl = ttl;
    loop {
        if let Some(deadline) = now.checked_add(ttl) {
            return deadline;
        }
        ttl /= 2;
    }
}

pub(crate) struct CacheEntry {
    value: Box<dyn Any + Send + Sync>,
    expired_at: Instant,
}

impl CacheEntry {
    pub(crate) fn new<T>(value: T, expired_at: Instant) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            value: Box::new(value),
            expired_at,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.expired_at
    }

    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        self.expired_at.saturating_duration_since(now)
    }

    #[cfg(test)]
    pub(crate) fn expired_at(&self) -> Instant {
        self.expired_at
    }

    pub(crate) fn set_expired_at(&mut self, expired_at: Instant) {
        self.expired_at = expired_at;
    }

    /// Replaces value and expiry of an entry that is refreshed in place.
    pub(crate) fn refresh<T>(&mut self, value: T, expired_at: Instant)
    where
        T: Send + Sync + 'static,
    {
        self.value = Box::new(value);
        self.expired_at = expired_at;
    }

    /// Returns the stored value as `T`.
    ///
    /// ## Panics
    /// Panics if the entry holds a value of a different type. Every key must always be used with
    /// the same value type.
    pub(crate) fn value<T>(&self, key: &str) -> &T
    where
        T: 'static,
    {
        match self.value.downcast_ref::<T>() {
            Some(value) => value,
            None => panic!(
                "cached value for key {key:?} is not of type {}",
                any::type_name::<T>()
            ),
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("expired_at", &self.expired_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_expires_at_the_deadline() {
        // given
        let now = Instant::now();
        let entry = CacheEntry::new(1_u32, now + Duration::from_secs(1));

        // then
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::from_secs(1)));
        assert_eq!(entry.remaining(now), Duration::from_secs(1));
        assert_eq!(entry.remaining(now + Duration::from_secs(2)), Duration::ZERO);
    }

    #[test]
    fn it_saturates_deadlines_past_the_end_of_time() {
        // given
        let now = Instant::now();

        // when
        let near = deadline_after(now, Duration::from_secs(1));
        let far = deadline_after(now, Duration::MAX);

        // then
        assert_eq!(near, now + Duration::from_secs(1));
        assert!(far > now + Duration::from_secs(60 * 60 * 24 * 365));
    }

    #[test]
    fn it_refreshes_in_place() {
        // given
        let now = Instant::now();
        let mut entry = CacheEntry::new(String::from("old"), now);

        // when
        entry.refresh(String::from("new"), now + Duration::from_secs(5));

        // then
        assert_eq!(entry.value::<String>("key"), "new");
        assert_eq!(entry.expired_at(), now + Duration::from_secs(5));
    }

    #[test]
    #[should_panic(expected = "is not of type")]
    fn it_panics_on_type_mismatch() {
        // given
        let entry = CacheEntry::new(1_u32, Instant::now());

        // when
        entry.value::<String>("key");
    }
}
