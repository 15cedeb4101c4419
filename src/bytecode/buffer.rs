//! Append-mostly growable array backing chunks and constant pools.

use std::ops::{Deref, DerefMut};

/// Smallest capacity a buffer grows to on its first push.
const MIN_CAPACITY: usize = 8;

/// Capacity after growing a buffer that currently holds `capacity` slots.
#[inline]
pub fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

/// A growable array with a fixed doubling policy (floor 8).
///
/// The logical capacity follows `grow_capacity` exactly, independent of how
/// much the allocator actually hands back, so growth is reproducible.
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    items: Vec<T>,
    capacity: usize,
    grows: usize,
}

impl<T> Buffer<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
            grows: 0,
        }
    }

    /// Append an item, doubling the capacity when it is exhausted.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            let new_capacity = grow_capacity(self.capacity);
            self.items.reserve_exact(new_capacity - self.items.len());
            self.capacity = new_capacity;
            self.grows += 1;
        }
        self.items.push(item);
    }

    /// Release the backing storage and reset to the empty state.
    pub fn free(&mut self) {
        self.items = Vec::new();
        self.capacity = 0;
        self.grows = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of times the buffer has reallocated since it was created or freed.
    pub fn grow_count(&self) -> usize {
        self.grows
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for Buffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T> FromIterator<T> for Buffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut buffer = Buffer::new();
        for item in iter {
            buffer.push(item);
        }
        buffer
    }
}

impl<'a, T> IntoIterator for &'a Buffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_push_allocates_eight() {
        let mut buffer = Buffer::new();
        assert_eq!(buffer.capacity(), 0);
        buffer.push(1u8);
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.grow_count(), 1);
    }

    #[test]
    fn test_doubles_when_full() {
        let mut buffer = Buffer::new();
        for i in 0..9 {
            buffer.push(i);
        }
        assert_eq!(buffer.capacity(), 16);
        for i in 9..17 {
            buffer.push(i);
        }
        assert_eq!(buffer.capacity(), 32);
        assert_eq!(buffer.grow_count(), 3);
    }

    #[test]
    fn test_free_resets() {
        let mut buffer: Buffer<u32> = (0..20).collect();
        buffer.free();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.grow_count(), 0);
        buffer.push(7);
        assert_eq!(buffer.as_slice(), &[7]);
    }

    proptest! {
        #[test]
        fn prop_push_preserves_order(items in proptest::collection::vec(any::<i32>(), 0..500)) {
            let mut buffer = Buffer::new();
            for item in &items {
                buffer.push(*item);
            }
            prop_assert_eq!(buffer.len(), items.len());
            prop_assert_eq!(buffer.as_slice(), items.as_slice());
        }

        #[test]
        fn prop_reallocations_are_logarithmic(n in 1usize..5000) {
            let mut buffer = Buffer::new();
            for i in 0..n {
                buffer.push(i);
            }
            // 8, 16, 32, ... so ceil(log2(n / 8)) + 1 growths at most
            let bound = (usize::BITS - (n.max(8) - 1).leading_zeros()) as usize - 2;
            prop_assert!(buffer.grow_count() <= bound, "{} growths for {} pushes", buffer.grow_count(), n);
            prop_assert!(buffer.capacity() >= n);
        }
    }
}
