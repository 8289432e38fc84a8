//! Fixed-capacity window over the most recent chroma frames
//!
//! Slots are allocated once and recycled; `push` copies the frame into the
//! slot of the oldest entry, so callers keep ownership of their buffers.

#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<Vec<f64>>,
    /// Slot holding the oldest frame
    start: usize,
    count: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, bins: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");
        Self {
            slots: vec![vec![0.0; bins]; capacity],
            start: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Append a frame, evicting the oldest one once the buffer is full.
    ///
    /// # Panics
    /// Panics if `frame` does not have the buffer's bin count.
    pub fn push(&mut self, frame: &[f64]) {
        let capacity = self.slots.len();
        let index = if self.is_full() {
            let oldest = self.start;
            self.start = (self.start + 1) % capacity;
            oldest
        } else {
            let next = (self.start + self.count) % capacity;
            self.count += 1;
            next
        };
        self.slots[index].copy_from_slice(frame);
    }

    /// Frame at position `i`, where 0 is the oldest retained frame
    pub fn at(&self, i: usize) -> &[f64] {
        assert!(i < self.count, "index {} out of {} frames", i, self.count);
        &self.slots[(self.start + i) % self.slots.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.count).map(move |i| self.at(i))
    }
}
