//! Intrusive free list for the descriptor pool

use super::descriptor::{DescId, Descriptor};

/// LIFO free list threaded through the descriptor slots
///
/// The list owns no storage of its own: each free slot's `next_free`
/// holds the index of the slot below it. The most recently freed slot is
/// handed out first, which keeps hot descriptors in cache.
#[derive(Debug, Default)]
pub struct FreeList {
    /// Index of the first free slot
    head: Option<u32>,
    /// Number of slots on the list
    len: usize,
}

impl FreeList {
    /// Create an empty free list
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot at the front; it becomes the next one handed out
    pub fn push_front<T>(&mut self, slots: &mut [Descriptor<T>], id: DescId) {
        let slot = &mut slots[id.index()];
        debug_assert!(!slot.in_use, "leased slot pushed onto free list");
        slot.next_free = self.head;
        self.head = Some(id.0);
        self.len += 1;
    }

    /// Remove and return the front slot, or `None` if the list is empty
    pub fn pop_front<T>(&mut self, slots: &mut [Descriptor<T>]) -> Option<DescId> {
        let head = self.head?;
        let slot = &mut slots[head as usize];
        self.head = slot.next_free.take();
        self.len -= 1;
        Some(slot.id)
    }

    /// Unlink every slot, returning how many were on the list
    pub fn drain<T>(&mut self, slots: &mut [Descriptor<T>]) -> usize {
        let mut drained = 0;
        while self.pop_front(slots).is_some() {
            drained += 1;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Peek at the slot the next pop would return
    pub fn front(&self) -> Option<DescId> {
        self.head.map(DescId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(n: u32) -> Vec<Descriptor<()>> {
        (0..n).map(|i| Descriptor::new(DescId(i))).collect()
    }

    #[test]
    fn test_free_list_lifo() {
        let mut slots = slots(3);
        let mut list = FreeList::new();
        assert!(list.is_empty());

        for i in 0..3 {
            list.push_front(&mut slots, DescId(i));
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.front(), Some(DescId(2)));

        assert_eq!(list.pop_front(&mut slots), Some(DescId(2)));
        assert_eq!(list.pop_front(&mut slots), Some(DescId(1)));

        // Most recently pushed comes back first
        list.push_front(&mut slots, DescId(2));
        assert_eq!(list.pop_front(&mut slots), Some(DescId(2)));
        assert_eq!(list.pop_front(&mut slots), Some(DescId(0)));
        assert_eq!(list.pop_front(&mut slots), None);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_free_list_drain() {
        let mut slots = slots(5);
        let mut list = FreeList::new();
        for i in 0..5 {
            list.push_front(&mut slots, DescId(i));
        }

        assert_eq!(list.drain(&mut slots), 5);
        assert!(list.is_empty());
        assert!(slots.iter().all(|s| s.next_free.is_none()));
    }
}
