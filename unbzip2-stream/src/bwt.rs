//! Inverse Burrows-Wheeler Transform.
//!
//! A block's BWT bytes are collected into a `u32` arena sized for the
//! stream's maximum block length and kept across blocks. Each entry holds the
//! byte in its low 8 bits; the inverse pass stores the successor index in the
//! upper 24 bits, so walking from the origin yields the original bytes without
//! a second allocation.

/// Reusable storage for one block's BWT output.
#[derive(Debug, Clone)]
pub struct BwtBuffer {
    tt: Vec<u32>,
    counts: [u32; 256],
    len: usize,
    capacity: usize,
}

impl BwtBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            tt: Vec::new(),
            counts: [0; 256],
            len: 0,
            capacity: 0,
        }
    }

    /// Start a new block holding at most `capacity` bytes.
    ///
    /// The arena only grows, so a stream of smaller blocks reuses it as is.
    pub fn reset(&mut self, capacity: usize) {
        if self.tt.len() < capacity {
            self.tt.resize(capacity, 0);
        }
        self.capacity = capacity;
        self.counts = [0; 256];
        self.len = 0;
    }

    /// Number of bytes collected for the current block.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the current block is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes the current block may hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one byte. Returns `false` if the block is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= self.capacity {
            return false;
        }
        self.tt[self.len] = u32::from(byte);
        self.counts[byte as usize] += 1;
        self.len += 1;
        true
    }

    /// Append `count` copies of `byte`. Returns `false` if they do not fit.
    #[inline]
    pub fn push_run(&mut self, byte: u8, count: usize) -> bool {
        if count > self.capacity - self.len {
            return false;
        }
        self.tt[self.len..self.len + count].fill(u32::from(byte));
        self.counts[byte as usize] += count as u32;
        self.len += count;
        true
    }

    /// Link the collected bytes and iterate the original block from `origin`.
    ///
    /// Returns `None` when `origin` does not index a collected byte. An empty
    /// block is only valid with origin 0.
    pub fn inverse(&mut self, origin: usize) -> Option<InverseBwt<'_>> {
        if self.len == 0 {
            return (origin == 0).then_some(InverseBwt {
                tt: &[],
                pos: 0,
                remaining: 0,
            });
        }
        if origin >= self.len {
            return None;
        }

        let mut next = [0u32; 256];
        let mut sum = 0u32;
        for (slot, &count) in next.iter_mut().zip(self.counts.iter()) {
            *slot = sum;
            sum += count;
        }

        let tt = &mut self.tt[..self.len];
        for i in 0..tt.len() {
            let byte = (tt[i] & 0xFF) as usize;
            let target = next[byte] as usize;
            tt[target] |= (i as u32) << 8;
            next[byte] += 1;
        }

        Some(InverseBwt {
            pos: tt[origin] >> 8,
            tt,
            remaining: self.len,
        })
    }
}

impl Default for BwtBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a block's bytes in original order.
#[derive(Debug)]
pub struct InverseBwt<'a> {
    tt: &'a [u32],
    pos: u32,
    remaining: usize,
}

impl Iterator for InverseBwt<'_> {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.tt[self.pos as usize];
        self.pos = entry >> 8;
        self.remaining -= 1;
        Some(entry as u8)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for InverseBwt<'_> {}
