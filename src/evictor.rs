//! Usage based eviction policies.
//!
//! An evictor ranks the keys of a [`Cache`](crate::Cache) by how valuable they are to keep. The
//! cache reports every read and write through [`UsageEvictor::used`] and every deletion through
//! [`UsageEvictor::remove`]. The janitor asks for the [`UsageEvictor::excess`] and evicts that
//! many keys from the front of [`UsageEvictor::iter_worst`].

use std::fmt;

mod lfu;
mod lru;
mod order_list;

pub use lfu::LfuEvictor;
pub use lru::LruEvictor;

/// Ranking policy deciding which live entries are least worth keeping.
pub trait UsageEvictor: fmt::Debug + Send + Sync {
    /// Records that `key` was just read or written.
    fn used(&self, key: &str);

    /// Number of tracked keys above the configured capacity.
    fn excess(&self) -> usize;

    /// Tracked keys, least valuable first.
    ///
    /// The evictor stays locked while the iterator is alive, so drop it before touching anything
    /// that may call back into the evictor.
    fn iter_worst(&self) -> Box<dyn Iterator<Item = String> + '_>;

    /// Stops tracking `key`. Unknown keys are ignored.
    fn remove(&self, key: &str);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
