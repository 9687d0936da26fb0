use std::collections::VecDeque;

/// Bounded FIFO: the newest item is at the front, pushing into a full queue evicts the oldest.
#[derive(Debug, Clone)]
pub struct CircularQueue<T> {
    deque: VecDeque<T>,
    capacity: usize,
}

impl<T> CircularQueue<T> {
    /// `capacity` of zero is treated as one.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        let capacity = cap.max(1);

        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.deque.pop_back()
        } else {
            None
        };

        self.deque.push_front(item);

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn latest(&self) -> Option<&T> {
        self.deque.front()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.deque.clear()
    }

    /// Newest to oldest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest() {
        let mut q = CircularQueue::with_capacity(2);

        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), Some(1));
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(q.latest(), Some(&3));
    }
}
