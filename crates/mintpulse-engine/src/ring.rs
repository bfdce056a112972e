//! Bounded circular buffer.
//!
//! When full, a push overwrites the oldest item and hands it back to the
//! caller. Every operation is O(1) except iteration and `clear`.

/// A fixed-capacity FIFO ring buffer.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<Option<T>>,
    /// Next write position.
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create a ring buffer with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            buffer: (0..cap).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Push an item, returning the evicted oldest item if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.len == self.buffer.len() {
            self.buffer[self.head].take()
        } else {
            self.len += 1;
            None
        };
        self.buffer[self.head] = Some(item);
        self.head = (self.head + 1) % self.buffer.len();
        evicted
    }

    /// Oldest item, if any.
    pub fn oldest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.buffer[self.start()].as_ref()
    }

    /// Newest item, if any.
    pub fn newest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.buffer.len() - 1) % self.buffer.len();
        self.buffer[idx].as_ref()
    }

    /// Remove and return the oldest item.
    pub fn pop_oldest(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let start = self.start();
        self.len -= 1;
        self.buffer[start].take()
    }

    /// Iterate over items in insertion order (oldest first).
    ///
    /// Use `.rev()` for newest first.
    pub fn iter(&self) -> RingBufferIter<'_, T> {
        RingBufferIter {
            buffer: &self.buffer,
            front: self.start(),
            remaining: self.len,
        }
    }

    /// Number of items currently in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Clear all items.
    pub fn clear(&mut self) {
        for slot in &mut self.buffer {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    fn start(&self) -> usize {
        (self.head + self.buffer.len() - self.len) % self.buffer.len()
    }
}

/// Iterator over a RingBuffer.
pub struct RingBufferIter<'a, T> {
    buffer: &'a [Option<T>],
    front: usize,
    remaining: usize,
}

impl<'a, T> Iterator for RingBufferIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.buffer[self.front].as_ref();
        self.front = (self.front + 1) % self.buffer.len();
        self.remaining -= 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for RingBufferIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let idx = (self.front + self.remaining) % self.buffer.len();
        self.buffer[idx].as_ref()
    }
}

impl<'a, T> ExactSizeIterator for RingBufferIter<'a, T> {}
