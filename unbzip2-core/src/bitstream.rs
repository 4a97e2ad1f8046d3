//! Bit-level reading over a sequence of byte chunks.
//!
//! bzip2 packs its fields MSB-first: the first bit of the stream is the most
//! significant bit of the first byte. [`BitReader`] turns an ordered series of
//! arbitrarily sized chunks into that bit stream and keeps monotonic counters
//! of how far it has read.
//!
//! Chunks come from a [`ChunkSource`]. A source answers `None` when no more
//! chunks are *currently* available; a read that needs more bits at that
//! point fails with [`Bz2Error::UnexpectedEndOfInput`]. Making sure enough
//! input is buffered before a read is the caller's job.
//!
//! # Example
//!
//! ```
//! use std::collections::VecDeque;
//! use unbzip2_core::bitstream::BitReader;
//!
//! let mut chunks = VecDeque::new();
//! chunks.push_back(vec![0b1010_0000]);
//! chunks.push_back(vec![0xFF]);
//!
//! let mut reader = BitReader::new(chunks);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(9).unwrap(), 0b0_0000_1111);
//! assert_eq!(reader.bytes_consumed(), 2);
//! ```

use crate::error::{Bz2Error, Result};
use std::collections::VecDeque;

/// A supplier of input chunks, pulled by [`BitReader`] as it runs dry.
pub trait ChunkSource {
    /// Return the next pending chunk, or `None` if nothing is available now.
    fn next_chunk(&mut self) -> Option<Vec<u8>>;
}

impl ChunkSource for VecDeque<Vec<u8>> {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.pop_front()
    }
}

/// Adapts a closure into a [`ChunkSource`].
pub struct PullFn<F>(pub F);

impl<F> ChunkSource for PullFn<F>
where
    F: FnMut() -> Option<Vec<u8>>,
{
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        (self.0)()
    }
}

/// An MSB-first bit reader over chunks supplied by a [`ChunkSource`].
#[derive(Debug)]
pub struct BitReader<S: ChunkSource> {
    /// Where further chunks come from.
    source: S,
    /// Chunk currently being read.
    current: Vec<u8>,
    /// Read position inside `current`.
    pos: usize,
    /// Bit buffer; valid bits are the low `bits_in_buffer` bits, MSB-first.
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u32,
    /// Total bits handed out to callers.
    total_bits_read: u64,
}

impl<S: ChunkSource> BitReader<S> {
    /// Create a new `BitReader` pulling from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: Vec::new(),
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get a reference to the chunk source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the chunk source, e.g. to queue more input.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume this `BitReader` and return the chunk source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Total number of bits read so far.
    pub fn bits_read(&self) -> u64 {
        self.total_bits_read
    }

    /// Number of input bytes logically consumed.
    ///
    /// A byte that has been only partly read counts as consumed.
    pub fn bytes_consumed(&self) -> u64 {
        self.total_bits_read.div_ceil(8)
    }

    fn next_byte(&mut self) -> Option<u8> {
        loop {
            if let Some(&byte) = self.current.get(self.pos) {
                self.pos += 1;
                return Some(byte);
            }
            self.current = self.source.next_chunk()?;
            self.pos = 0;
        }
    }

    #[inline]
    fn fill_buffer(&mut self, count: u32) -> Result<()> {
        while self.bits_in_buffer < count {
            let byte = self
                .next_byte()
                .ok_or_else(|| Bz2Error::unexpected_end(self.total_bits_read))?;
            self.buffer = (self.buffer << 8) | byte as u64;
            self.bits_in_buffer += 8;
        }
        Ok(())
    }

    /// Read up to 32 bits, most significant bit first.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of bits to read (0-32)
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        let count = count as u32;
        self.fill_buffer(count)?;

        let shift = self.bits_in_buffer - count;
        let mask = (1u64 << count) - 1;
        let result = ((self.buffer >> shift) & mask) as u32;

        self.bits_in_buffer = shift;
        self.total_bits_read += count as u64;

        Ok(result)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read 48 bits, e.g. a bzip2 block marker.
    pub fn read_u48(&mut self) -> Result<u64> {
        let high = self.read_bits(24)? as u64;
        let low = self.read_bits(24)? as u64;
        Ok((high << 24) | low)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let partial = self.bits_in_buffer % 8;
        self.bits_in_buffer -= partial;
        self.total_bits_read += partial as u64;
    }

    /// Whether the read position sits on a byte boundary.
    pub fn is_aligned(&self) -> bool {
        self.total_bits_read % 8 == 0
    }
}
