//! Fixed-capacity lossy byte ring.
//!
//! Writes never fail: once the ring is full the oldest unread byte is
//! overwritten and the read index is dragged along with the write index.

#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    buffer: [u8; N],
    write_idx: usize,
    read_idx: usize,
    count: usize,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            write_idx: 0,
            read_idx: 0,
            count: 0,
        }
    }

    /// Store one byte, overwriting the oldest unread byte when full.
    pub fn write(&mut self, byte: u8) {
        if N == 0 {
            return;
        }

        self.buffer[self.write_idx] = byte;
        self.write_idx = (self.write_idx + 1) % N;

        if self.count == N {
            // Oldest byte was just overwritten
            self.read_idx = self.write_idx;
        } else {
            self.count += 1;
        }

        // NASA Rule 5: Safety assertions for invariants
        debug_assert!(self.count <= N, "ring count exceeds capacity");
        debug_assert!(self.write_idx < N && self.read_idx < N, "ring index out of range");
    }

    /// Take the oldest unread byte, or `None` when the ring is empty.
    pub fn read_next(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }

        let byte = self.buffer[self.read_idx];
        self.read_idx = (self.read_idx + 1) % N;
        self.count -= 1;
        Some(byte)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn read_index(&self) -> usize {
        self.read_idx
    }

    pub fn write_index(&self) -> usize {
        self.write_idx
    }

    pub fn clear(&mut self) {
        self.write_idx = 0;
        self.read_idx = 0;
        self.count = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
