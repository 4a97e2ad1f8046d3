//! Decoding of a single compressed block.

use crate::BlockSize;
use crate::bwt::BwtBuffer;
use crate::huffman::{self, HuffmanTable, MAX_TABLES, MIN_TABLES, SYMBOLS_PER_GROUP};
use crate::mtf::MtfList;
use crate::rle::{RUNA, RUNB, Rle1Decoder, ZeroRun};
use tracing::{debug, warn};
use unbzip2_core::crc::Bz2Crc;
use unbzip2_core::error::{Bz2Error, Result};
use unbzip2_core::{BitReader, ChunkSource};

/// A verified, fully decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Decompressed bytes (possibly empty).
    pub data: Vec<u8>,
    /// CRC stored in the block header, equal to the CRC of `data`.
    pub crc: u32,
}

/// Decoder for block bodies.
///
/// Holds the scratch buffers that would otherwise be allocated per block:
/// the BWT arena, selectors and Huffman tables.
#[derive(Debug, Default)]
pub struct BlockDecoder {
    bwt: BwtBuffer,
    selectors: Vec<u8>,
    tables: Vec<HuffmanTable>,
    lengths: Vec<u8>,
}

impl BlockDecoder {
    /// Create a decoder with empty scratch buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the block whose marker was just read.
    ///
    /// `index` is the zero-based block number, used in errors and logs.
    pub fn decode<S: ChunkSource>(
        &mut self,
        reader: &mut BitReader<S>,
        block_size: BlockSize,
        index: u64,
    ) -> Result<DecodedBlock> {
        let start = reader.bits_read();
        let stored_crc = reader.read_bits(32)?;

        if reader.read_bit()? {
            // Never produced by bzip2 0.9.5 or later; decoded as if unset
            warn!(block = index, "block uses deprecated randomisation, ignoring flag");
        }

        let origin = reader.read_bits(24)? as usize;
        if origin >= block_size.max_block_len() {
            return Err(Bz2Error::malformed_block(
                start,
                format!("origin pointer {origin} exceeds block size"),
            ));
        }

        let mut mtf = read_symbol_map(reader)?;
        let alphabet_size = mtf.len() + 2;

        let position = reader.bits_read();
        let num_tables = reader.read_bits(3)? as usize;
        if !(MIN_TABLES..=MAX_TABLES).contains(&num_tables) {
            return Err(Bz2Error::malformed_block(
                position,
                format!("invalid number of Huffman tables: {num_tables}"),
            ));
        }

        let position = reader.bits_read();
        let num_selectors = reader.read_bits(15)? as usize;
        if num_selectors == 0 {
            return Err(Bz2Error::malformed_block(position, "block has no selectors"));
        }
        huffman::read_selectors(reader, num_tables, num_selectors, &mut self.selectors)?;

        self.tables.clear();
        for _ in 0..num_tables {
            let position = reader.bits_read();
            huffman::read_code_lengths(reader, alphabet_size, &mut self.lengths)?;
            self.tables
                .push(HuffmanTable::from_lengths(&self.lengths, position)?);
        }

        self.bwt.reset(block_size.max_block_len());
        decode_symbols(
            reader,
            &self.tables,
            &self.selectors,
            &mut mtf,
            &mut self.bwt,
            (alphabet_size - 1) as u16,
        )?;

        let bwt_len = self.bwt.len();
        let bytes = self.bwt.inverse(origin).ok_or_else(|| {
            Bz2Error::malformed_block(
                start,
                format!("origin pointer {origin} out of range for {bwt_len} bytes"),
            )
        })?;

        let mut data = Vec::with_capacity(bwt_len + bwt_len / 4);
        let mut rle = Rle1Decoder::new();
        for byte in bytes {
            rle.push(byte, &mut data);
        }

        let computed = Bz2Crc::compute(&data);
        if computed != stored_crc {
            return Err(Bz2Error::block_crc_mismatch(index, stored_crc, computed));
        }

        debug!(
            block = index,
            bwt_len,
            output_len = data.len(),
            crc = format_args!("{stored_crc:#010x}"),
            "decoded block"
        );

        Ok(DecodedBlock {
            data,
            crc: stored_crc,
        })
    }
}

/// Read the two-level used-byte bitmap into the initial MTF list.
fn read_symbol_map<S: ChunkSource>(reader: &mut BitReader<S>) -> Result<MtfList> {
    let position = reader.bits_read();
    let ranges = reader.read_bits(16)?;

    let mut used = [false; 256];
    for i in 0..16 {
        if ranges & (0x8000 >> i) == 0 {
            continue;
        }
        let bits = reader.read_bits(16)?;
        for j in 0..16 {
            if bits & (0x8000 >> j) != 0 {
                used[i * 16 + j] = true;
            }
        }
    }

    let mtf = MtfList::from_used(&used);
    if mtf.is_empty() {
        return Err(Bz2Error::malformed_block(position, "block uses no symbols"));
    }
    Ok(mtf)
}

/// Decode Huffman symbols up to end-of-block into the BWT buffer.
fn decode_symbols<S: ChunkSource>(
    reader: &mut BitReader<S>,
    tables: &[HuffmanTable],
    selectors: &[u8],
    mtf: &mut MtfList,
    bwt: &mut BwtBuffer,
    end_of_block: u16,
) -> Result<()> {
    let mut run = ZeroRun::new();
    let mut next_selector = 0usize;
    let mut group_left = 0usize;
    let mut table = &tables[0];

    loop {
        if group_left == 0 {
            let selector = *selectors.get(next_selector).ok_or_else(|| {
                Bz2Error::malformed_block(reader.bits_read(), "symbol data runs past the selectors")
            })?;
            table = tables.get(selector as usize).ok_or_else(|| {
                Bz2Error::malformed_block(reader.bits_read(), "selector names a missing table")
            })?;
            next_selector += 1;
            group_left = SYMBOLS_PER_GROUP;
        }
        group_left -= 1;

        let position = reader.bits_read();
        let symbol = table.decode(reader)?;

        if symbol == RUNA || symbol == RUNB {
            if !run.push(symbol) {
                return Err(Bz2Error::malformed_block(position, "zero run too long"));
            }
            continue;
        }

        if let Some(length) = run.take() {
            if !bwt.push_run(mtf.front(), length) {
                return Err(Bz2Error::malformed_block(
                    position,
                    "run exceeds the stream's block size",
                ));
            }
        }

        if symbol == end_of_block {
            return Ok(());
        }

        let byte = mtf.promote(usize::from(symbol - 1)).ok_or_else(|| {
            Bz2Error::malformed_block(position, format!("symbol {symbol} outside the alphabet"))
        })?;
        if !bwt.push(byte) {
            return Err(Bz2Error::malformed_block(
                position,
                "block exceeds the stream's block size",
            ));
        }
    }
}
