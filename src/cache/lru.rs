//! LRU Tracker Module
//!
//! Recency order for the store, kept as a doubly-linked list threaded
//! through a slot arena so every reordering is O(1).

// == Node ==
#[derive(Debug)]
struct Node<T> {
    item: T,
    /// Neighbour towards the most recently used end
    prev: Option<usize>,
    /// Neighbour towards the least recently used end
    next: Option<usize>,
}

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// Items live in numbered slots that stay stable for the item's lifetime:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Freed slots are recycled, so the arena never grows past the peak
/// number of simultaneously stored items.
#[derive(Debug)]
pub struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts an item as most recently used and returns its slot.
    pub fn push_front(&mut self, item: T) -> usize {
        let node = Node {
            item,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.link_front(slot);
        self.len += 1;
        slot
    }

    // == Touch ==
    /// Marks a slot as recently used (moves it to the front).
    pub fn touch(&mut self, slot: usize) {
        if self.head == Some(slot) || !self.is_occupied(slot) {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    // == Remove ==
    /// Removes the item in `slot`, returning it if the slot was occupied.
    pub fn remove(&mut self, slot: usize) -> Option<T> {
        if !self.is_occupied(slot) {
            return None;
        }
        self.unlink(slot);
        let node = self.slots[slot].take()?;
        self.free.push(slot);
        self.len -= 1;
        Some(node.item)
    }

    // == Evict Oldest ==
    /// Removes the least recently used item, returning it with the slot it
    /// occupied.
    pub fn evict_oldest(&mut self) -> Option<(usize, T)> {
        let slot = self.tail?;
        self.remove(slot).map(|item| (slot, item))
    }

    // == Peek ==
    /// Slot of the least recently used item.
    pub fn peek_oldest(&self) -> Option<usize> {
        self.tail
    }

    /// Slot of the most recently used item.
    pub fn peek_newest(&self) -> Option<usize> {
        self.head
    }

    // == Access ==
    /// Item in `slot`, None if the slot is vacant.
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)?.as_ref().map(|node| &node.item)
    }

    /// Mutable item in `slot`; does not change recency.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot)?.as_mut().map(|node| &mut node.item)
    }

    // == Length ==
    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Clear ==
    /// Removes every item and releases all slots.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Iteration ==
    /// Iterates from least to most recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.tail,
            remaining: self.len,
        }
    }

    // == Linking ==
    fn is_occupied(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    fn node(&self, slot: usize) -> &Node<T> {
        match &self.slots[slot] {
            Some(node) => node,
            None => unreachable!("linked slot {slot} is vacant"),
        }
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node<T> {
        match &mut self.slots[slot] {
            Some(node) => node,
            None => unreachable!("linked slot {slot} is vacant"),
        }
    }

    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(slot);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => self.node_mut(head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.node(slot);
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(slot);
        node.prev = None;
        node.next = None;
    }
}

// == Iterator ==
/// Borrowing iterator over a [`RecencyList`], oldest first.
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.list.node(slot);
        self.cursor = node.prev;
        self.remaining -= 1;
        Some((slot, &node.item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
