//! Minimal bzip2 writer used to craft inputs for unit tests.
//!
//! Uses fixed-length Huffman codes and a naive rotation sort, so it is only
//! suitable for small blocks.

use crate::{BLOCK_MAGIC, EOS_MAGIC};
use std::collections::VecDeque;
use unbzip2_core::BitReader;
use unbzip2_core::crc::{Bz2Crc, combine_stream_crc};

pub fn reader(data: &[u8]) -> BitReader<VecDeque<Vec<u8>>> {
    BitReader::new(VecDeque::from(vec![data.to_vec()]))
}

/// MSB-first bit writer.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: u64, count: u32) {
        for i in (0..count).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.bits += 1;
            if self.bits == 8 {
                self.bytes.push(self.acc as u8);
                self.acc = 0;
                self.bits = 0;
            }
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push((self.acc << (8 - self.bits)) as u8);
        }
        self.bytes
    }
}

/// Knobs for writing deliberately unusual blocks.
pub struct BlockOptions {
    pub randomised: bool,
    pub num_tables: usize,
    pub extra_selectors: usize,
    /// Overrides the selector count.
    pub selectors: Option<usize>,
    pub origin: Option<usize>,
    pub stored_crc: Option<u32>,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            randomised: false,
            num_tables: 2,
            extra_selectors: 0,
            selectors: None,
            origin: None,
            stored_crc: None,
        }
    }
}

fn rle1_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == byte && run < 255 {
            run += 1;
        }
        if run >= 4 {
            out.extend_from_slice(&[byte; 4]);
            out.push((run - 4) as u8);
        } else {
            out.extend(std::iter::repeat_n(byte, run));
        }
        i += run;
    }
    out
}

fn bwt(data: &[u8]) -> (Vec<u8>, usize) {
    let n = data.len();
    if n == 0 {
        return (Vec::new(), 0);
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        (0..n)
            .map(|i| data[(a + i) % n].cmp(&data[(b + i) % n]))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let origin = indices.iter().position(|&i| i == 0).unwrap();
    (indices.iter().map(|&i| data[(i + n - 1) % n]).collect(), origin)
}

/// Write a block (marker included) holding `data`.
pub fn write_block(w: &mut BitWriter, data: &[u8], options: &BlockOptions) {
    let (column, origin) = bwt(&rle1_encode(data));
    write_bwt_block(w, &column, origin, Bz2Crc::compute(data), options);
}

/// Write a block from an already transformed column.
pub fn write_bwt_block(
    w: &mut BitWriter,
    column: &[u8],
    origin: usize,
    crc: u32,
    options: &BlockOptions,
) {
    let mut used = [false; 256];
    for &byte in column {
        used[byte as usize] = true;
    }
    if column.is_empty() {
        used[0] = true;
    }
    let mut list: Vec<u8> = (0..=255u8).filter(|&b| used[b as usize]).collect();

    let mut symbols = Vec::new();
    let mut zeros = 0usize;
    let flush = |zeros: &mut usize, symbols: &mut Vec<u16>| {
        if *zeros == 0 {
            return;
        }
        let mut pending = *zeros - 1;
        loop {
            symbols.push((pending & 1) as u16);
            if pending < 2 {
                break;
            }
            pending = (pending - 2) / 2;
        }
        *zeros = 0;
    };
    for &byte in column {
        let index = list.iter().position(|&b| b == byte).unwrap();
        if index == 0 {
            zeros += 1;
            continue;
        }
        flush(&mut zeros, &mut symbols);
        list.remove(index);
        list.insert(0, byte);
        symbols.push(index as u16 + 1);
    }
    flush(&mut zeros, &mut symbols);
    let alphabet = used.iter().filter(|&&u| u).count() + 2;
    symbols.push(alphabet as u16 - 1);

    let code_len = (usize::BITS - (alphabet - 1).leading_zeros()).max(1);
    let num_selectors = options
        .selectors
        .unwrap_or(symbols.len().div_ceil(50) + options.extra_selectors);

    w.write(BLOCK_MAGIC, 48);
    w.write(u64::from(options.stored_crc.unwrap_or(crc)), 32);
    w.write(u64::from(options.randomised), 1);
    w.write(options.origin.unwrap_or(origin) as u64, 24);

    let mut ranges = 0u64;
    for i in 0..16 {
        if used[i * 16..i * 16 + 16].iter().any(|&u| u) {
            ranges |= 0x8000 >> i;
        }
    }
    w.write(ranges, 16);
    for i in 0..16 {
        if ranges & (0x8000 >> i) != 0 {
            let mut bits = 0u64;
            for j in 0..16 {
                if used[i * 16 + j] {
                    bits |= 0x8000 >> j;
                }
            }
            w.write(bits, 16);
        }
    }

    w.write(options.num_tables as u64, 3);
    w.write(num_selectors as u64, 15);
    for _ in 0..num_selectors {
        w.write(0, 1);
    }
    for _ in 0..options.num_tables {
        w.write(u64::from(code_len), 5);
        for _ in 0..alphabet {
            w.write(0, 1);
        }
    }
    for &symbol in &symbols {
        w.write(u64::from(symbol), code_len);
    }
}

/// Build a complete stream, one block per entry of `blocks`.
pub fn encode_stream(blocks: &[&[u8]], level: u8) -> Vec<u8> {
    let mut w = BitWriter::new();
    write_stream(&mut w, blocks, level);
    w.finish()
}

fn write_stream(w: &mut BitWriter, blocks: &[&[u8]], level: u8) {
    for &byte in b"BZh" {
        w.write(u64::from(byte), 8);
    }
    w.write(u64::from(b'0' + level), 8);
    let mut combined = 0u32;
    for block in blocks {
        write_block(w, block, &BlockOptions::default());
        combined = combine_stream_crc(combined, Bz2Crc::compute(block));
    }
    w.write(EOS_MAGIC, 48);
    w.write(u64::from(combined), 32);
}
