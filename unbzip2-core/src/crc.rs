//! CRC implementations for the bzip2 format.
//!
//! bzip2 checksums every block with CRC-32/BZIP2 and combines the block
//! CRCs into a per-stream value stored in the end-of-stream footer.
//!
//! - Polynomial: 0x04C11DB7 (not reflected)
//! - Initial value: 0xFFFFFFFF
//! - Final XOR: 0xFFFFFFFF
//! - Bits processed MSB-first, the opposite order of the ZIP/GZIP CRC-32
//!
//! Inputs of 16 bytes or more go through a slicing-by-8 path that folds eight
//! bytes per step using eight pre-computed tables.

/// Generator polynomial, MSB-first form.
const POLY: u32 = 0x04C1_1DB7;

/// CRC-32/BZIP2 slicing-by-8 lookup tables.
///
/// `TABLES[0]` is the classic byte-at-a-time table; `TABLES[k]` gives the
/// contribution of a byte followed by `k` further bytes.
const TABLES: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0usize;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = (prev << 8) ^ tables[0][(prev >> 24) as usize];
            i += 1;
        }
        t += 1;
    }

    tables
};

/// CRC-32/BZIP2 calculator.
///
/// # Example
///
/// ```
/// use unbzip2_core::crc::Bz2Crc;
///
/// let mut crc = Bz2Crc::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.finalize(), 0xFC891918);
/// ```
#[derive(Debug, Clone)]
pub struct Bz2Crc {
    crc: u32,
}

impl Bz2Crc {
    /// Create a new CRC calculator.
    pub fn new() -> Self {
        Self { crc: 0xFFFF_FFFF }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        self.crc = 0xFFFF_FFFF;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        if data.len() >= 16 {
            crc_slice8(&mut self.crc, data);
        } else {
            crc_bytewise(&mut self.crc, data);
        }
    }

    /// Update the CRC with a single byte.
    #[inline(always)]
    pub fn update_byte(&mut self, byte: u8) {
        self.crc = (self.crc << 8) ^ TABLES[0][((self.crc >> 24) ^ byte as u32) as usize];
    }

    /// Get the current CRC value (without finalizing).
    #[inline(always)]
    pub fn value(&self) -> u32 {
        !self.crc
    }

    /// Finalize and return the CRC value.
    #[inline(always)]
    pub fn finalize(self) -> u32 {
        !self.crc
    }

    /// Compute the CRC of a slice in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Bz2Crc {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn crc_bytewise(crc: &mut u32, data: &[u8]) {
    let mut c = *crc;
    for &byte in data {
        c = (c << 8) ^ TABLES[0][((c >> 24) ^ byte as u32) as usize];
    }
    *crc = c;
}

#[inline]
fn crc_slice8(crc: &mut u32, data: &[u8]) {
    let mut c = *crc;
    let mut words = data.chunks_exact(8);

    for b in &mut words {
        let x = c ^ u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        c = TABLES[7][(x >> 24) as usize]
            ^ TABLES[6][((x >> 16) & 0xFF) as usize]
            ^ TABLES[5][((x >> 8) & 0xFF) as usize]
            ^ TABLES[4][(x & 0xFF) as usize]
            ^ TABLES[3][b[4] as usize]
            ^ TABLES[2][b[5] as usize]
            ^ TABLES[1][b[6] as usize]
            ^ TABLES[0][b[7] as usize];
    }

    crc_bytewise(&mut c, words.remainder());
    *crc = c;
}

/// Fold a block CRC into a stream's combined CRC.
///
/// `combined' = rotl(combined, 1) ^ block_crc`, with 32-bit wraparound.
#[inline]
pub fn combine_stream_crc(combined: u32, block_crc: u32) -> u32 {
    combined.rotate_left(1) ^ block_crc
}

/// Running combined CRC of one logical bzip2 stream.
///
/// Starts at zero at each stream header and is compared against the value
/// stored in the stream's end-of-stream footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCrc {
    combined: u32,
    blocks: u64,
}

impl StreamCrc {
    /// Create a fresh accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the CRC of the next block.
    pub fn push_block(&mut self, block_crc: u32) {
        self.combined = combine_stream_crc(self.combined, block_crc);
        self.blocks += 1;
    }

    /// Current combined value.
    pub fn value(&self) -> u32 {
        self.combined
    }

    /// Number of blocks folded in so far.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(Bz2Crc::compute(b"123456789"), 0xFC89_1918);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(Bz2Crc::compute(b""), 0);
        assert_eq!(Bz2Crc::compute(b"a"), 0x1993_9B6B);
        assert_eq!(
            Bz2Crc::compute(b"The quick brown fox jumps over the lazy dog"),
            0x459D_EE61
        );
        assert_eq!(
            Bz2Crc::compute(b"Hello World!\nHow little you are. now.\n\n"),
            0x7E0F_EEF5
        );
    }

    #[test]
    fn test_slice8_matches_bytewise() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 31 + 7) as u8).collect();
        for len in [0, 1, 7, 8, 15, 16, 17, 63, 64, 999, 1000] {
            let mut fast = 0xFFFF_FFFF;
            crc_slice8(&mut fast, &data[..len]);
            let mut slow = 0xFFFF_FFFF;
            crc_bytewise(&mut slow, &data[..len]);
            assert_eq!(fast, slow, "length {len}");
        }
    }

    #[test]
    fn test_incremental() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut crc = Bz2Crc::new();
        for byte in data {
            crc.update_byte(*byte);
        }
        assert_eq!(crc.value(), Bz2Crc::compute(data));

        crc.reset();
        crc.update(&data[..20]);
        crc.update(&data[20..]);
        assert_eq!(crc.finalize(), Bz2Crc::compute(data));
    }

    #[test]
    fn test_stream_combination() {
        let mut stream = StreamCrc::new();
        assert_eq!(stream.value(), 0);

        stream.push_block(0x8000_0001);
        assert_eq!(stream.value(), 0x8000_0001);

        // Rotation carries the top bit around to bit 0
        stream.push_block(0);
        assert_eq!(stream.value(), 0x0000_0003);
        assert_eq!(stream.blocks(), 2);

        assert_eq!(combine_stream_crc(0xFFFF_FFFF, 0xFFFF_FFFF), 0);
    }

    #[test]
    fn test_single_block_stream_equals_block_crc() {
        let block = Bz2Crc::compute(b"a");
        let mut stream = StreamCrc::new();
        stream.push_block(block);
        assert_eq!(stream.value(), block);
    }
}
