use std::time::Duration;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors reported by the cache itself.
///
/// Provider errors never appear here: [`Cache::get_or_create`](crate::Cache::get_or_create)
/// hands them back to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache duration must be at least {min:?}, got {ttl:?}")]
    TtlTooShort { ttl: Duration, min: Duration },
}
