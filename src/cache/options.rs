use crate::Cache;
use crate::evictor::{LfuEvictor, LruEvictor, UsageEvictor};
use std::fmt;
use std::time::Duration;

/// Interval between two janitor passes unless configured otherwise.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest TTL accepted by [`Cache::get_or_create`].
pub const MIN_TTL: Duration = Duration::from_millis(5);

/// One-time setting applied while a [`Cache`] is constructed.
///
/// Options are applied in the given order. Misconfiguration is a programming error and panics
/// right away instead of being ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOption {
    /// Evict the least recently used entries once more than `capacity` entries are alive.
    LruEviction(usize),
    /// Evict the least frequently used entries once more than `capacity` entries are alive.
    LfuEviction(usize),
    /// Time between two janitor passes.
    JanitorInterval(Duration),
}

pub(crate) struct Settings {
    pub(crate) evictor: Option<Box<dyn UsageEvictor>>,
    pub(crate) janitor_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            evictor: None,
            janitor_interval: DEFAULT_JANITOR_INTERVAL,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("evictor", &self.evictor)
            .field("janitor_interval", &self.janitor_interval)
            .finish()
    }
}

impl Settings {
    /// ## Panics
    /// Panics on a zero capacity, a zero janitor interval, or a second usage evictor.
    pub(crate) fn apply(&mut self, option: CacheOption) {
        match option {
            CacheOption::LruEviction(capacity) => {
                self.set_evictor(Box::new(LruEvictor::with_capacity(capacity)))
            }
            CacheOption::LfuEviction(capacity) => {
                self.set_evictor(Box::new(LfuEvictor::with_capacity(capacity)))
            }
            CacheOption::JanitorInterval(interval) => {
                assert!(
                    !interval.is_zero(),
                    "janitor interval must be greater than zero"
                );
                self.janitor_interval = interval;
            }
        }
    }

    fn set_evictor(&mut self, evictor: Box<dyn UsageEvictor>) {
        assert!(self.evictor.is_none(), "evictor by usage already set");
        self.evictor = Some(evictor);
    }
}

/// Builder for a [`Cache`].
///
/// ```rust
/// use expiring_cache::Cache;
/// use std::time::Duration;
///
/// let cache = Cache::builder()
///     .lru_eviction(1_000)
///     .janitor_interval(Duration::from_secs(30))
///     .build();
/// assert!(cache.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct CacheBuilder {
    settings: Settings,
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a single [`CacheOption`].
    pub fn option(mut self, option: CacheOption) -> Self {
        self.settings.apply(option);
        self
    }

    /// ## Panics
    /// Panics if `capacity` is zero or an evictor is already configured.
    pub fn lru_eviction(self, capacity: usize) -> Self {
        self.option(CacheOption::LruEviction(capacity))
    }

    /// ## Panics
    /// Panics if `capacity` is zero or an evictor is already configured.
    pub fn lfu_eviction(self, capacity: usize) -> Self {
        self.option(CacheOption::LfuEviction(capacity))
    }

    /// Uses a custom ranking policy.
    ///
    /// ## Panics
    /// Panics if an evictor is already configured.
    pub fn usage_evictor<E>(mut self, evictor: E) -> Self
    where
        E: UsageEvictor + 'static,
    {
        self.settings.set_evictor(Box::new(evictor));
        self
    }

    /// ## Panics
    /// Panics if `interval` is zero.
    pub fn janitor_interval(self, interval: Duration) -> Self {
        self.option(CacheOption::JanitorInterval(interval))
    }

    pub fn build(self) -> Cache {
        Cache::from_settings(self.settings)
    }
}
