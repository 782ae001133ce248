#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list whose nodes live in a slot vector and are addressed by index.
///
/// Indices stay stable until the node is removed, so callers can keep them in a map and move or
/// remove single nodes in O(1). Freed slots are reused by later pushes.
#[derive(Debug)]
pub(crate) struct OrderList<T> {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
}

impl<T> Default for OrderList<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T> OrderList<T> {
    pub(crate) fn with_capacity(capacity: usize) -> OrderList<T> {
        OrderList {
            head: None,
            tail: None,
            len: 0,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.node(index).map(|node| &node.value)
    }

    /// Index of the oldest node.
    pub(crate) fn front(&self) -> Option<usize> {
        self.head
    }

    /// Index of the node following `index`, towards the back.
    pub(crate) fn next(&self, index: usize) -> Option<usize> {
        self.node(index).and_then(|node| node.next)
    }

    /// Appends an item to the back of the list and returns its index.
    pub(crate) fn push_back(&mut self, value: T) -> usize {
        let node = Node {
            value,
            prev: None,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.attach_back(index);
        self.len += 1;
        index
    }

    /// Removes the node at `index` and returns its value.
    ///
    /// Returns [None] if there is no node at that index.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        self.node(index)?;

        self.detach(index);
        let node = self.slots[index].take()?;
        self.free.push(index);
        self.len -= 1;
        Some(node.value)
    }

    /// Moves the node at `index` to the back of the list.
    pub(crate) fn move_to_back(&mut self, index: usize) -> bool {
        if self.node(index).is_none() {
            return false;
        }

        if self.tail != Some(index) {
            self.detach(index);
            self.attach_back(index);
        }
        true
    }

    fn node(&self, index: usize) -> Option<&Node<T>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn detach(&mut self, index: usize) {
        let Some(node) = self.node_mut(index) else {
            return;
        };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev {
            Some(prev) => {
                if let Some(prev_node) = self.node_mut(prev) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next) => {
                if let Some(next_node) = self.node_mut(next) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn attach_back(&mut self, index: usize) {
        let old_tail = self.tail;

        if let Some(node) = self.node_mut(index) {
            node.prev = old_tail;
            node.next = None;
        }

        match old_tail {
            Some(tail) => {
                if let Some(tail_node) = self.node_mut(tail) {
                    tail_node.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }

        self.tail = Some(index);
    }
}
