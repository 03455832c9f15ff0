//! Capacity-bounded arena with O(1) membership and swap-remove
//!
//! Rosters, depth populations and per-owner holdings all live in one of these
//! so that any sweep over them has a fixed upper cost.

use std::hash::Hash;

use ahash::AHashMap;

/// Why an insert was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedInsert {
    Full,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct BoundedSet<T> {
    items: Vec<T>,
    slots: AHashMap<T, usize>,
    capacity: usize,
}

impl<T: Copy + Eq + Hash> BoundedSet<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            slots: AHashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn contains(&self, item: &T) -> bool {
        self.slots.contains_key(item)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Append an item, refusing duplicates and overflow
    pub fn insert(&mut self, item: T) -> Result<usize, BoundedInsert> {
        if self.slots.contains_key(&item) {
            return Err(BoundedInsert::Duplicate);
        }
        if self.is_full() {
            return Err(BoundedInsert::Full);
        }
        let slot = self.items.len();
        self.items.push(item);
        self.slots.insert(item, slot);
        Ok(slot)
    }

    /// Remove an item by swapping the last element into its slot
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(slot) = self.slots.remove(item) else {
            return false;
        };
        self.items.swap_remove(slot);
        if let Some(moved) = self.items.get(slot) {
            self.slots.insert(*moved, slot);
        }
        true
    }
}
