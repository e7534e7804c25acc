//! Double-ended queue with a fixed maximum length.
use std::collections::{vec_deque, VecDeque};

/// A double-ended queue holding at most `max_len` elements.
///
/// Elements are pushed at the front; pushing into a full queue drops the back element.
/// Index `0` refers to the front, i.e., the most recently pushed element.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundedDeque<T> {
    max_len: usize,
    items: VecDeque<T>,
}

impl<T> BoundedDeque<T> {
    /// Creates an empty queue.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            items: VecDeque::with_capacity(max_len),
        }
    }

    /// Creates a queue from its elements, front first. Returns `None` if there are too many.
    pub fn from_vec(max_len: usize, items: Vec<T>) -> Option<Self> {
        if items.len() > max_len {
            return None;
        }
        let mut deque = Self::new(max_len);
        deque.items.extend(items);
        Some(deque)
    }

    /// Pushes an element at the front, dropping the back one if the queue is full.
    pub fn push_front(&mut self, item: T) {
        if self.items.len() == self.max_len {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    /// Removes the back (oldest) element.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Returns the front (newest) element.
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Returns the back (oldest) element.
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Returns the `i`-th element counted from the front.
    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the queue holds no element.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if the queue holds `max_len` elements.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.max_len
    }

    /// Returns the maximum number of elements.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Removes all elements.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// Iterates mutably from front to back.
    pub fn iter_mut(&mut self) -> vec_deque::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<T: Clone> BoundedDeque<T> {
    /// Returns the elements, front first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::BoundedDeque;

    #[test]
    fn test_push_front_evicts_back() {
        let mut q = BoundedDeque::new(3);
        for i in 0..3 {
            q.push_front(i);
        }
        assert!(q.is_full());
        assert_eq!(q.front(), Some(&2));
        assert_eq!(q.back(), Some(&0));
        assert_eq!(q.get(1), Some(&1));

        q.push_front(3);
        assert_eq!(q.len(), 3);
        assert_eq!(q.to_vec(), vec![3, 2, 1]);

        assert_eq!(q.pop_back(), Some(1));
        assert_eq!(q.to_vec(), vec![3, 2]);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.max_len(), 3);
    }

    #[test]
    fn test_from_vec() {
        let q = BoundedDeque::from_vec(2, vec![1.5f32, 0.5]).unwrap();
        assert_eq!(q.front(), Some(&1.5));
        assert!(BoundedDeque::from_vec(2, vec![1, 2, 3]).is_none());
    }
}
