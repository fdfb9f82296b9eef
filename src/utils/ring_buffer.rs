//! Fixed-capacity circular buffer.

/// Keeps the most recent `capacity` items, overwriting the oldest.
///
/// Storage is allocated once; pushes never reallocate after the buffer fills.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index the next push writes to once the buffer is full.
    cursor: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.cursor] = item;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.slots.len() < self.capacity {
            0
        } else {
            self.cursor
        };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    /// Mutable access in storage order, not age order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_then_evicts_oldest() {
        let mut buf = RingBuffer::new(3);
        for i in 1..=5 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_partial_fill_keeps_insertion_order() {
        let mut buf = RingBuffer::new(4);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_and_zero_capacity() {
        let mut buf = RingBuffer::new(0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2]);
        buf.clear();
        assert_eq!(buf.len(), 0);
        buf.push(3);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![3]);
    }
}
