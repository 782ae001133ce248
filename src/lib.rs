//! A thread-safe, expiring in-memory cache with per-key locking.
//!
//! Values are computed once with [`Cache::get_or_create`] and reused until their TTL runs out.
//! Every operation only locks the key it works on: independent keys proceed in parallel, while at
//! most one provider runs per key at a time.
//!
//! # Features
//!
//! - Per-entry TTL with lazy expiry on read
//! - Background janitor that removes expired entries, started on the first write and stopped
//!   again once the cache is empty
//! - Optional usage based eviction, least-recently-used or least-frequently-used, enforced by the
//!   janitor
//! - Explicit invalidation and TTL extension
//! - No unsafe code
//!
//! # Examples
//!
//! Computing a value once and reading it back:
//!
//! ```rust
//! use expiring_cache::{Cache, CacheError};
//! use std::time::Duration;
//!
//! let cache = Cache::new();
//!
//! let value = cache.get_or_create("answer", Duration::from_secs(60), || {
//!     Ok::<_, CacheError>(42_u32)
//! })?;
//! assert_eq!(value, 42);
//!
//! let cached = cache.try_get::<u32>("answer").unwrap();
//! assert_eq!(cached.value, 42);
//! assert!(cached.remaining_ttl <= Duration::from_secs(60));
//! # Ok::<(), CacheError>(())
//! ```
//!
//! Bounding the number of entries:
//!
//! ```rust
//! use expiring_cache::{Cache, CacheError, CacheOption};
//! use std::time::Duration;
//!
//! let cache = Cache::with_options([CacheOption::LruEviction(2)]);
//!
//! for key in ["a", "b", "c"] {
//!     cache.get_or_create(key, Duration::from_secs(3600), || Ok::<_, CacheError>(key.len()))?;
//! }
//!
//! // eviction happens on the next janitor pass
//! cache.janitor_purge();
//! assert_eq!(cache.len(), 2);
//! assert!(cache.try_get::<usize>("a").is_none());
//! # Ok::<(), CacheError>(())
//! ```
//!
//! Sharing the cache between threads:
//!
//! ```rust
//! use expiring_cache::{Cache, CacheError};
//! use std::thread;
//! use std::time::Duration;
//!
//! let cache = Cache::new();
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let cache = cache.clone();
//!         thread::spawn(move || {
//!             cache.get_or_create("shared", Duration::from_secs(60), || {
//!                 Ok::<_, CacheError>(String::from("computed once"))
//!             })
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap()?, "computed once");
//! }
//! # Ok::<(), CacheError>(())
//! ```

#![forbid(unsafe_code)]
pub mod cache;
pub mod error;
pub mod evictor;
pub mod key_lock;

pub use cache::options::{CacheBuilder, CacheOption, DEFAULT_JANITOR_INTERVAL, MIN_TTL};
pub use cache::stats::Stats;
pub use cache::{Cache, Cached};
pub use error::{CacheError, CacheResult};
pub use evictor::{LfuEvictor, LruEvictor, UsageEvictor};
pub use key_lock::{KeyGuard, KeyLock};
