//! Unit-at-a-time bzip2 parser.
//!
//! [`Bz2Parser`] reads exactly one structural unit per call: a stream
//! header, a block, or an end-of-stream footer. It tracks which stream it is
//! in and the running combined CRC, but never decides when to read; that is
//! left to the caller, which must ensure enough input is buffered.

use crate::block::BlockDecoder;
use crate::header::{self, Marker};
use crate::BlockSize;
use tracing::debug;
use unbzip2_core::crc::StreamCrc;
use unbzip2_core::error::{Bz2Error, Result};
use unbzip2_core::{BitReader, ChunkSource};

/// One structural unit of a bzip2 input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A stream header declaring the block size.
    Header(BlockSize),
    /// A verified block's decompressed bytes (possibly empty).
    Block(Vec<u8>),
    /// A verified end-of-stream footer.
    EndOfStream {
        /// The stream's combined CRC, as stored and as computed.
        combined_crc: u32,
    },
}

/// Parser state carried across units.
#[derive(Debug, Default)]
pub struct Bz2Parser {
    /// Block size of the current stream, `None` between streams.
    block_size: Option<BlockSize>,
    stream_crc: StreamCrc,
    blocks: BlockDecoder,
    streams_completed: u64,
    blocks_decoded: u64,
}

impl Bz2Parser {
    /// Create a parser positioned before a stream header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block size of the stream being decoded, if inside one.
    pub fn block_size(&self) -> Option<BlockSize> {
        self.block_size
    }

    /// Check if a stream header has been read without its footer.
    pub fn in_stream(&self) -> bool {
        self.block_size.is_some()
    }

    /// Streams closed by a verified footer.
    pub fn streams_completed(&self) -> u64 {
        self.streams_completed
    }

    /// Blocks decoded and verified across all streams.
    pub fn blocks_decoded(&self) -> u64 {
        self.blocks_decoded
    }

    /// Read the next unit.
    ///
    /// On error the reader is left at an unspecified position and the parser
    /// must not be used again.
    pub fn next_unit<S: ChunkSource>(&mut self, reader: &mut BitReader<S>) -> Result<Unit> {
        let Some(block_size) = self.block_size else {
            let block_size = header::read_stream_header(reader)?;
            debug!(
                stream = self.streams_completed,
                level = block_size.level(),
                "stream header"
            );
            self.block_size = Some(block_size);
            self.stream_crc = StreamCrc::new();
            return Ok(Unit::Header(block_size));
        };

        match header::read_marker(reader)? {
            Marker::Block => {
                let block = self.blocks.decode(reader, block_size, self.blocks_decoded)?;
                self.stream_crc.push_block(block.crc);
                self.blocks_decoded += 1;
                Ok(Unit::Block(block.data))
            }
            Marker::EndOfStream => {
                let stored = reader.read_bits(32)?;
                let computed = self.stream_crc.value();
                if stored != computed {
                    return Err(Bz2Error::stream_crc_mismatch(
                        self.streams_completed,
                        stored,
                        computed,
                    ));
                }

                // The next stream, if any, starts on a byte boundary
                reader.align_to_byte();
                debug!(
                    stream = self.streams_completed,
                    blocks = self.stream_crc.blocks(),
                    crc = format_args!("{stored:#010x}"),
                    "end of stream"
                );

                self.block_size = None;
                self.streams_completed += 1;
                Ok(Unit::EndOfStream {
                    combined_crc: stored,
                })
            }
        }
    }
}
