use crate::evictor::UsageEvictor;
use crate::evictor::order_list::OrderList;
use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

/// Least-frequently-used ranking.
///
/// Every observed frequency owns a bucket holding its keys in the order they reached that
/// frequency. Eviction walks the buckets from the lowest frequency upwards, oldest key first, so
/// keys with equal frequency fall back to least-recently-used order.
#[derive(Debug)]
pub struct LfuEvictor {
    capacity: usize,
    state: Mutex<LfuState>,
}

#[derive(Debug, Default)]
struct LfuState {
    nodes: HashMap<String, LfuNode, RandomState>,
    buckets: BTreeMap<u64, OrderList<String>>,
}

#[derive(Debug)]
struct LfuNode {
    frequency: u64,
    index: usize,
}

impl LfuEvictor {
    /// ## Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> LfuEvictor {
        assert!(capacity > 0, "capacity must be greater than zero");

        LfuEvictor {
            capacity,
            state: Mutex::new(LfuState {
                nodes: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
                buckets: BTreeMap::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn frequency(&self, key: &str) -> Option<u64> {
        self.state.lock().nodes.get(key).map(|node| node.frequency)
    }
}

impl LfuState {
    fn push(&mut self, frequency: u64, key: String) -> usize {
        self.buckets.entry(frequency).or_default().push_back(key)
    }

    fn detach(&mut self, frequency: u64, index: usize) -> Option<String> {
        let bucket = self.buckets.get_mut(&frequency)?;
        let key = bucket.remove(index);

        if bucket.is_empty() {
            self.buckets.remove(&frequency);
        }

        key
    }
}

impl UsageEvictor for LfuEvictor {
    fn used(&self, key: &str) {
        let mut state = self.state.lock();

        let Some(node) = state.nodes.remove(key) else {
            let index = state.push(1, key.to_owned());
            state.nodes.insert(key.to_owned(), LfuNode {
                frequency: 1,
                index,
            });
            return;
        };

        let owned_key = state
            .detach(node.frequency, node.index)
            .unwrap_or_else(|| key.to_owned());

        let frequency = node.frequency + 1;
        let index = state.push(frequency, owned_key);
        state
            .nodes
            .insert(key.to_owned(), LfuNode { frequency, index });
    }

    fn excess(&self) -> usize {
        self.state.lock().nodes.len().saturating_sub(self.capacity)
    }

    fn iter_worst(&self) -> Box<dyn Iterator<Item = String> + '_> {
        let state = self.state.lock();
        let (frequency, cursor) = match state.buckets.first_key_value() {
            Some((frequency, bucket)) => (Some(*frequency), bucket.front()),
            None => (None, None),
        };

        Box::new(LfuWorst {
            state,
            frequency,
            cursor,
        })
    }

    fn remove(&self, key: &str) {
        let mut state = self.state.lock();

        if let Some(node) = state.nodes.remove(key) {
            state.detach(node.frequency, node.index);
        }
    }

    fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }
}

struct LfuWorst<'a> {
    state: MutexGuard<'a, LfuState>,
    frequency: Option<u64>,
    cursor: Option<usize>,
}

impl Iterator for LfuWorst<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frequency = self.frequency?;

            if let Some(index) = self.cursor {
                let bucket = self.state.buckets.get(&frequency)?;
                self.cursor = bucket.next(index);
                return bucket.get(index).cloned();
            }

            let next_bucket = self
                .state
                .buckets
                .range((Excluded(frequency), Unbounded))
                .next()
                .map(|(frequency, bucket)| (*frequency, bucket.front()));

            match next_bucket {
                Some((frequency, front)) => {
                    self.frequency = Some(frequency);
                    self.cursor = front;
                }
                None => {
                    self.frequency = None;
                    return None;
                }
            }
        }
    }
}
