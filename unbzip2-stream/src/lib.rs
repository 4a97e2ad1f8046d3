//! Streaming bzip2 decompression.
//!
//! This crate decodes the bzip2 format incrementally from byte chunks of any
//! size, emitting each block's bytes once its CRC has been verified.
//!
//! Each block is undone through the inverse of the encoder's pipeline:
//! 1. Huffman decoding with up to 6 tables, switched every 50 symbols
//! 2. Zero-run decoding (RUNA/RUNB) and inverse Move-to-Front
//! 3. Inverse Burrows-Wheeler Transform
//! 4. Expansion of the initial run-length encoding
//!
//! [`StreamingDecoder`] owns the buffering policy: it waits until enough
//! input is queued that a whole block can be parsed without running dry,
//! then hands out one block per step. Concatenated streams are decoded back
//! to back.
//!
//! # Example
//!
//! ```
//! use unbzip2_stream::{ChunkDecoder, DecodeStep, StreamingDecoder};
//!
//! // An empty bzip2 stream: header followed by the end-of-stream footer
//! let compressed = [
//!     0x42, 0x5A, 0x68, 0x39, 0x17, 0x72, 0x45, 0x38, 0x50, 0x90, 0, 0, 0, 0,
//! ];
//!
//! let mut decoder = StreamingDecoder::new();
//! decoder.push_chunk(compressed[..5].to_vec());
//! decoder.push_chunk(compressed[5..].to_vec());
//! decoder.end_input();
//!
//! let mut output = Vec::new();
//! loop {
//!     match decoder.step().unwrap() {
//!         DecodeStep::Output(data) => output.extend_from_slice(&data),
//!         DecodeStep::Finished => break,
//!         _ => {}
//!     }
//! }
//! assert!(output.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
mod bwt;
mod decode;
mod header;
mod huffman;
mod mtf;
mod reader;
mod rle;
mod stream;
#[cfg(test)]
mod test_util;

pub use block::{BlockDecoder, DecodedBlock};
pub use bwt::{BwtBuffer, InverseBwt};
pub use decode::{Bz2Parser, Unit};
pub use reader::{
    Bz2Reader, DEFAULT_BUFFER_SIZE, decompress, decompress_chunks, decompress_reader,
};
pub use stream::{CoordinatorState, DecoderConfig, DecoderStats, StreamingDecoder};

pub use unbzip2_core::{Bz2Error, ChunkDecoder, DecodeStep, ErrorKind, Result};

/// Stream header magic ("BZh").
pub const STREAM_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];

/// Block header magic (0x314159265359, the digits of pi).
pub const BLOCK_MAGIC: u64 = 0x3141_5926_5359;

/// End of stream magic (0x177245385090, the digits of sqrt(pi)).
pub const EOS_MAGIC: u64 = 0x1772_4538_5090;

/// Maximum block size (900k).
pub const MAX_BLOCK_SIZE: usize = 900_000;

/// Block-size parameter of a stream (1-9, in units of 100k).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockSize(u8);

impl BlockSize {
    /// Create a block size from its level, or `None` outside 1-9.
    pub fn new(level: u8) -> Option<Self> {
        (1..=9).contains(&level).then_some(Self(level))
    }

    /// Parse the ASCII digit that follows the stream magic.
    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::new(digit.wrapping_sub(b'0'))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Largest number of BWT bytes a block of this stream may hold.
    pub fn max_block_len(&self) -> usize {
        self.0 as usize * 100_000
    }
}
