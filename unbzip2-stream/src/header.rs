//! Stream header and block marker parsing.

use crate::{BLOCK_MAGIC, BlockSize, EOS_MAGIC, STREAM_MAGIC};
use unbzip2_core::error::{Bz2Error, Result};
use unbzip2_core::{BitReader, ChunkSource};

/// What follows a 48-bit marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// A compressed block.
    Block,
    /// The end-of-stream footer (stored combined CRC follows).
    EndOfStream,
}

/// Read "BZh" plus the block-size digit.
pub fn read_stream_header<S: ChunkSource>(reader: &mut BitReader<S>) -> Result<BlockSize> {
    let mut magic = [0u8; 3];
    for byte in &mut magic {
        *byte = reader.read_bits(8)? as u8;
    }

    if magic[..2] != STREAM_MAGIC[..2] {
        return Err(Bz2Error::malformed_header(format!(
            "invalid magic: expected {:02x?}, found {:02x?}",
            &STREAM_MAGIC[..2],
            &magic[..2]
        )));
    }

    if magic[2] != STREAM_MAGIC[2] {
        return Err(Bz2Error::malformed_header(format!(
            "unsupported version byte 0x{:02x} (only 'h' is supported)",
            magic[2]
        )));
    }

    let digit = reader.read_bits(8)? as u8;
    BlockSize::from_digit(digit).ok_or_else(|| {
        Bz2Error::malformed_header(format!(
            "invalid block size: expected '1'-'9', found 0x{digit:02x}"
        ))
    })
}

/// Read the marker that starts every block and the footer.
pub fn read_marker<S: ChunkSource>(reader: &mut BitReader<S>) -> Result<Marker> {
    let position = reader.bits_read();
    match reader.read_u48()? {
        BLOCK_MAGIC => Ok(Marker::Block),
        EOS_MAGIC => Ok(Marker::EndOfStream),
        other => Err(Bz2Error::malformed_block(
            position,
            format!("invalid block marker {other:#014x}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use unbzip2_core::ErrorKind;

    fn reader(data: &[u8]) -> BitReader<VecDeque<Vec<u8>>> {
        BitReader::new(VecDeque::from(vec![data.to_vec()]))
    }

    #[test]
    fn test_header_parsing() {
        let mut r = reader(b"BZh9");
        assert_eq!(read_stream_header(&mut r).unwrap().level(), 9);

        let mut r = reader(b"BZh1");
        assert_eq!(read_stream_header(&mut r).unwrap().max_block_len(), 100_000);
    }

    #[test]
    fn test_header_invalid_magic() {
        let err = read_stream_header(&mut reader(b"XXXX")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        assert!(err.to_string().contains("invalid magic"));
    }

    #[test]
    fn test_header_bzip1_rejected() {
        let err = read_stream_header(&mut reader(b"BZ09")).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_header_invalid_block_size() {
        for digit in [b'0', b'a', 0xFF] {
            let err = read_stream_header(&mut reader(&[b'B', b'Z', b'h', digit])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        }
    }

    #[test]
    fn test_header_short_input() {
        let err = read_stream_header(&mut reader(b"BZ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfInput);
    }

    #[test]
    fn test_markers() {
        let mut r = reader(&[
            0x31, 0x41, 0x59, 0x26, 0x53, 0x59, 0x17, 0x72, 0x45, 0x38, 0x50, 0x90,
        ]);
        assert_eq!(read_marker(&mut r).unwrap(), Marker::Block);
        assert_eq!(read_marker(&mut r).unwrap(), Marker::EndOfStream);
    }

    #[test]
    fn test_invalid_marker() {
        let mut r = reader(&[0u8; 6]);
        let err = read_marker(&mut r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedBlock);
    }
}
