//! Inverse Move-to-Front for bzip2.
//!
//! The list holds actual symbol values rather than indices, so a block's list
//! starts as its used bytes in ascending order and a promoted index can be
//! emitted directly. The same list type drives selector decoding, where the
//! symbols are table numbers.

/// An MTF list over at most 256 symbols.
#[derive(Debug, Clone)]
pub struct MtfList {
    symbols: [u8; 256],
    len: usize,
}

impl MtfList {
    /// List `0, 1, .., len - 1`.
    pub fn identity(len: usize) -> Self {
        let len = len.min(256);
        let mut symbols = [0u8; 256];
        for (i, slot) in symbols.iter_mut().enumerate().take(len) {
            *slot = i as u8;
        }
        Self { symbols, len }
    }

    /// List of the byte values flagged in `used`, ascending.
    pub fn from_used(used: &[bool; 256]) -> Self {
        let mut symbols = [0u8; 256];
        let mut len = 0;
        for (byte, _) in used.iter().enumerate().filter(|&(_, &u)| u) {
            symbols[len] = byte as u8;
            len += 1;
        }
        Self { symbols, len }
    }

    /// Number of symbols in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Symbol at the front of the list.
    #[inline]
    pub fn front(&self) -> u8 {
        self.symbols[0]
    }

    /// Move the symbol at `index` to the front and return it.
    #[inline]
    pub fn promote(&mut self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        let symbol = self.symbols[index];
        if index > 0 {
            self.symbols.copy_within(0..index, 1);
            self.symbols[0] = symbol;
        }
        Some(symbol)
    }
}
