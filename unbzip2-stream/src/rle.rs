//! Run-length decoding for bzip2.
//!
//! bzip2 applies two kinds of RLE:
//! 1. Initial RLE (rle1): after 4 identical bytes, a count byte (0-251)
//!    gives the number of additional repeats
//! 2. Zero runs (rle2): runs of MTF index 0 are written in bijective base 2
//!    with the RUNA and RUNB symbols, least significant digit first

/// Zero-run digit worth 1 at its position.
pub const RUNA: u16 = 0;

/// Zero-run digit worth 2 at its position.
pub const RUNB: u16 = 1;

/// Longest run the digit accumulator accepts (2^21 exceeds any block).
const MAX_RUN_DIGITS: u32 = 21;

/// Accumulates RUNA/RUNB digits into a run length.
#[derive(Debug, Clone, Default)]
pub struct ZeroRun {
    length: u32,
    digits: u32,
}

impl ZeroRun {
    /// Create an empty run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a RUNA or RUNB digit. Returns `false` if the run grows implausibly long.
    #[inline]
    pub fn push(&mut self, symbol: u16) -> bool {
        if self.digits >= MAX_RUN_DIGITS {
            return false;
        }
        self.length += (u32::from(symbol) + 1) << self.digits;
        self.digits += 1;
        true
    }

    /// Take the pending run length, if any, and reset.
    #[inline]
    pub fn take(&mut self) -> Option<usize> {
        if self.digits == 0 {
            return None;
        }
        let length = self.length as usize;
        *self = Self::default();
        Some(length)
    }
}

/// Streaming decoder for the initial RLE.
#[derive(Debug, Clone, Default)]
pub struct Rle1Decoder {
    last: Option<u8>,
    run: u8,
}

impl Rle1Decoder {
    /// Create a decoder with no run in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, appending its expansion to `out`.
    #[inline]
    pub fn push(&mut self, byte: u8, out: &mut Vec<u8>) {
        if self.run == 4 {
            if let Some(last) = self.last {
                out.resize(out.len() + byte as usize, last);
            }
            self.run = 0;
            return;
        }

        if self.last == Some(byte) {
            self.run += 1;
        } else {
            self.last = Some(byte);
            self.run = 1;
        }
        out.push(byte);
    }
}
