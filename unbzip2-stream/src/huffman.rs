//! Huffman decoding for bzip2.
//!
//! Every block carries 2 to 6 canonical Huffman tables over the same
//! alphabet. A selector list names the table used for each group of 50
//! symbols. Selectors are stored unary-coded and MTF-encoded; code lengths
//! are stored as a 5-bit start value followed by per-symbol deltas.

use crate::mtf::MtfList;
use tracing::warn;
use unbzip2_core::error::{Bz2Error, Result};
use unbzip2_core::{BitReader, ChunkSource};

/// Minimum number of Huffman tables in a block.
pub const MIN_TABLES: usize = 2;

/// Maximum number of Huffman tables in a block.
pub const MAX_TABLES: usize = 6;

/// Symbols per selector group.
pub const SYMBOLS_PER_GROUP: usize = 50;

/// Maximum code length.
pub const MAX_CODE_LEN: usize = 20;

/// Selectors beyond this count are read but discarded.
pub const MAX_SELECTORS: usize = 18_002;

/// A canonical Huffman table for decoding.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Shortest code length in use.
    min_len: u8,
    /// Longest code length in use.
    max_len: u8,
    /// First canonical code of each length.
    first_code: [u32; MAX_CODE_LEN + 1],
    /// Largest code of each length, or -1 when no symbol has that length.
    limits: [i64; MAX_CODE_LEN + 1],
    /// Index in `perms` where the symbols of each length start.
    base_index: [u32; MAX_CODE_LEN + 1],
    /// Symbols ordered by (code length, symbol value).
    perms: Vec<u16>,
}

impl HuffmanTable {
    /// Build a decoding table from per-symbol code lengths (each 1..=20).
    ///
    /// `bit_position` is only used to locate errors.
    pub fn from_lengths(lengths: &[u8], bit_position: u64) -> Result<Self> {
        if lengths.is_empty() {
            return Err(Bz2Error::malformed_block(bit_position, "empty Huffman table"));
        }

        let mut counts = [0u32; MAX_CODE_LEN + 1];
        for &len in lengths {
            if len == 0 || len as usize > MAX_CODE_LEN {
                return Err(Bz2Error::malformed_block(
                    bit_position,
                    format!("Huffman code length {len} out of range"),
                ));
            }
            counts[len as usize] += 1;
        }

        // Kraft inequality: an over-subscribed table cannot be a prefix code
        let kraft: u64 = (1..=MAX_CODE_LEN)
            .map(|len| u64::from(counts[len]) << (MAX_CODE_LEN - len))
            .sum();
        if kraft > 1 << MAX_CODE_LEN {
            return Err(Bz2Error::malformed_block(
                bit_position,
                "over-subscribed Huffman code lengths",
            ));
        }

        let min_len = lengths.iter().copied().min().unwrap_or(1);
        let max_len = lengths.iter().copied().max().unwrap_or(1);

        let mut first_code = [0u32; MAX_CODE_LEN + 1];
        let mut limits = [-1i64; MAX_CODE_LEN + 1];
        let mut base_index = [0u32; MAX_CODE_LEN + 1];

        let mut code = 0u32;
        let mut index = 0u32;
        for len in min_len as usize..=max_len as usize {
            let count = counts[len];
            first_code[len] = code;
            base_index[len] = index;
            limits[len] = i64::from(code) + i64::from(count) - 1;
            code = (code + count) << 1;
            index += count;
        }

        let mut perms = Vec::with_capacity(lengths.len());
        for len in min_len..=max_len {
            perms.extend(
                lengths
                    .iter()
                    .enumerate()
                    .filter(|&(_, &l)| l == len)
                    .map(|(sym, _)| sym as u16),
            );
        }

        Ok(Self {
            min_len,
            max_len,
            first_code,
            limits,
            base_index,
            perms,
        })
    }

    /// Decode a single symbol.
    pub fn decode<S: ChunkSource>(&self, reader: &mut BitReader<S>) -> Result<u16> {
        let start = reader.bits_read();
        let mut len = self.min_len;
        let mut code = reader.read_bits(len)?;

        loop {
            let l = len as usize;
            if i64::from(code) <= self.limits[l] {
                let idx = self.base_index[l] + (code - self.first_code[l]);
                return self.perms.get(idx as usize).copied().ok_or_else(|| {
                    Bz2Error::malformed_block(start, "Huffman code maps outside the alphabet")
                });
            }

            len += 1;
            if len > self.max_len {
                return Err(Bz2Error::malformed_block(start, "invalid Huffman code"));
            }
            code = (code << 1) | reader.read_bits(1)?;
        }
    }
}

/// Read `count` unary-coded, MTF-encoded selectors into `out`.
///
/// Only the first [`MAX_SELECTORS`] are kept.
pub fn read_selectors<S: ChunkSource>(
    reader: &mut BitReader<S>,
    num_tables: usize,
    count: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    let mut mtf = MtfList::identity(num_tables);

    for i in 0..count {
        let start = reader.bits_read();
        let mut index = 0usize;
        while reader.read_bit()? {
            index += 1;
            if index >= num_tables {
                return Err(Bz2Error::malformed_block(
                    start,
                    format!("selector index exceeds {num_tables} tables"),
                ));
            }
        }

        let table = mtf.promote(index).ok_or_else(|| {
            Bz2Error::malformed_block(start, "selector index out of range")
        })?;
        if i < MAX_SELECTORS {
            out.push(table);
        }
    }

    if count > MAX_SELECTORS {
        warn!(
            selectors = count,
            kept = MAX_SELECTORS,
            "discarding excess selectors"
        );
    }

    Ok(())
}

/// Read the delta-coded code lengths of one table.
pub fn read_code_lengths<S: ChunkSource>(
    reader: &mut BitReader<S>,
    alphabet_size: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    let mut len = reader.read_bits(5)? as i32;

    for _ in 0..alphabet_size {
        loop {
            if !(1..=MAX_CODE_LEN as i32).contains(&len) {
                return Err(Bz2Error::malformed_block(
                    reader.bits_read(),
                    format!("code length {len} out of range"),
                ));
            }
            if !reader.read_bit()? {
                break;
            }
            if reader.read_bit()? {
                len -= 1;
            } else {
                len += 1;
            }
        }
        out.push(len as u8);
    }

    Ok(())
}
