use crate::evictor::UsageEvictor;
use crate::evictor::order_list::OrderList;
use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;

/// Least-recently-used ranking.
///
/// Keys are kept in recency order, most recently used at the back. Eviction starts at the front.
#[derive(Debug)]
pub struct LruEvictor {
    capacity: usize,
    state: Mutex<LruState>,
}

#[derive(Debug)]
struct LruState {
    order: OrderList<String>,
    positions: HashMap<String, usize, RandomState>,
}

impl LruEvictor {
    /// ## Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> LruEvictor {
        assert!(capacity > 0, "capacity must be greater than zero");

        LruEvictor {
            capacity,
            state: Mutex::new(LruState {
                order: OrderList::with_capacity(capacity),
                positions: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl UsageEvictor for LruEvictor {
    fn used(&self, key: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&index) = state.positions.get(key) {
            state.order.move_to_back(index);
        } else {
            let index = state.order.push_back(key.to_owned());
            state.positions.insert(key.to_owned(), index);
        }
    }

    fn excess(&self) -> usize {
        self.state.lock().order.len().saturating_sub(self.capacity)
    }

    fn iter_worst(&self) -> Box<dyn Iterator<Item = String> + '_> {
        let state = self.state.lock();
        let cursor = state.order.front();
        Box::new(LruWorst { state, cursor })
    }

    fn remove(&self, key: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(index) = state.positions.remove(key) {
            state.order.remove(index);
        }
    }

    fn len(&self) -> usize {
        self.state.lock().order.len()
    }
}

struct LruWorst<'a> {
    state: MutexGuard<'a, LruState>,
    cursor: Option<usize>,
}

impl Iterator for LruWorst<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        self.cursor = self.state.order.next(index);
        self.state.order.get(index).cloned()
    }
}
