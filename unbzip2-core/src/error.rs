//! Error types for bzip2 stream decoding.
//!
//! Every error is terminal for the decoder instance that raised it: the
//! streaming coordinator reports it once and refuses further work. The
//! variants distinguish malformed input, checksum failures, truncation and
//! caller-side aborts so that consumers can tell corruption from an
//! incomplete transfer.

use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for bzip2 decoding.
#[derive(Debug, Error)]
pub enum Bz2Error {
    /// I/O error from an adapter's underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bad stream magic or invalid block-size digit.
    #[error("Malformed stream header: {message}")]
    MalformedHeader {
        /// Description of the header error.
        message: String,
    },

    /// Invalid structure inside a block (tables, selectors, origin pointer).
    #[error("Malformed block at bit {bit_position}: {message}")]
    MalformedBlock {
        /// Bit offset in the input where the problem was detected.
        bit_position: u64,
        /// Description of the problem.
        message: String,
    },

    /// A block's decompressed bytes did not match its stored CRC.
    #[error("Block CRC mismatch in block {block}: stored {expected:#010x}, computed {computed:#010x}")]
    BlockCrcMismatch {
        /// Zero-based index of the block across the whole input.
        block: u64,
        /// CRC stored in the block header.
        expected: u32,
        /// CRC computed over the decoded bytes.
        computed: u32,
    },

    /// The end-of-stream CRC did not match the combination of block CRCs.
    #[error("Stream CRC mismatch in stream {stream}: stored {expected:#010x}, computed {computed:#010x}")]
    StreamCrcMismatch {
        /// Zero-based index of the logical stream within the input.
        stream: u64,
        /// CRC stored in the end-of-stream footer.
        expected: u32,
        /// Combined CRC accumulated over the stream's blocks.
        computed: u32,
    },

    /// Input ended without a clean end-of-stream marker.
    #[error("Truncated stream after {bytes_consumed} bytes: {message}")]
    TruncatedStream {
        /// Bytes of input consumed when truncation was detected.
        bytes_consumed: u64,
        /// Description of where the input stopped.
        message: String,
    },

    /// A bit read ran past the buffered input while more input was still
    /// expected. This indicates insufficient lookahead, not bad data.
    #[error("Unexpected end of buffered input at bit {bit_position}")]
    UnexpectedEndOfInput {
        /// Bit offset of the failed read.
        bit_position: u64,
    },

    /// Decoding was cancelled by the caller or an adapter.
    #[error("Decoding aborted: {reason}")]
    Aborted {
        /// Why decoding was aborted.
        reason: String,
    },

    /// The decoder already reported a terminal error and cannot continue.
    #[error("Decoder is broken by an earlier error")]
    DecoderBroken,
}

/// Result type alias for bzip2 decoding operations.
pub type Result<T> = std::result::Result<T, Bz2Error>;

/// Fieldless discriminant of [`Bz2Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Bz2Error::Io`].
    Io,
    /// See [`Bz2Error::MalformedHeader`].
    MalformedHeader,
    /// See [`Bz2Error::MalformedBlock`].
    MalformedBlock,
    /// See [`Bz2Error::BlockCrcMismatch`].
    BlockCrcMismatch,
    /// See [`Bz2Error::StreamCrcMismatch`].
    StreamCrcMismatch,
    /// See [`Bz2Error::TruncatedStream`].
    TruncatedStream,
    /// See [`Bz2Error::UnexpectedEndOfInput`].
    UnexpectedEndOfInput,
    /// See [`Bz2Error::Aborted`].
    Aborted,
    /// See [`Bz2Error::DecoderBroken`].
    DecoderBroken,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "io",
            Self::MalformedHeader => "malformed header",
            Self::MalformedBlock => "malformed block",
            Self::BlockCrcMismatch => "block crc mismatch",
            Self::StreamCrcMismatch => "stream crc mismatch",
            Self::TruncatedStream => "truncated stream",
            Self::UnexpectedEndOfInput => "unexpected end of input",
            Self::Aborted => "aborted",
            Self::DecoderBroken => "decoder broken",
        };
        f.write_str(name)
    }
}

impl Bz2Error {
    /// Create a malformed header error.
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            message: message.into(),
        }
    }

    /// Create a malformed block error.
    pub fn malformed_block(bit_position: u64, message: impl Into<String>) -> Self {
        Self::MalformedBlock {
            bit_position,
            message: message.into(),
        }
    }

    /// Create a block CRC mismatch error.
    pub fn block_crc_mismatch(block: u64, expected: u32, computed: u32) -> Self {
        Self::BlockCrcMismatch {
            block,
            expected,
            computed,
        }
    }

    /// Create a stream CRC mismatch error.
    pub fn stream_crc_mismatch(stream: u64, expected: u32, computed: u32) -> Self {
        Self::StreamCrcMismatch {
            stream,
            expected,
            computed,
        }
    }

    /// Create a truncated stream error.
    pub fn truncated(bytes_consumed: u64, message: impl Into<String>) -> Self {
        Self::TruncatedStream {
            bytes_consumed,
            message: message.into(),
        }
    }

    /// Create an unexpected end of input error.
    pub fn unexpected_end(bit_position: u64) -> Self {
        Self::UnexpectedEndOfInput { bit_position }
    }

    /// Create an aborted error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::MalformedHeader { .. } => ErrorKind::MalformedHeader,
            Self::MalformedBlock { .. } => ErrorKind::MalformedBlock,
            Self::BlockCrcMismatch { .. } => ErrorKind::BlockCrcMismatch,
            Self::StreamCrcMismatch { .. } => ErrorKind::StreamCrcMismatch,
            Self::TruncatedStream { .. } => ErrorKind::TruncatedStream,
            Self::UnexpectedEndOfInput { .. } => ErrorKind::UnexpectedEndOfInput,
            Self::Aborted { .. } => ErrorKind::Aborted,
            Self::DecoderBroken => ErrorKind::DecoderBroken,
        }
    }

    /// Whether the error means the compressed data itself is invalid.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedHeader
                | ErrorKind::MalformedBlock
                | ErrorKind::BlockCrcMismatch
                | ErrorKind::StreamCrcMismatch
        )
    }
}

impl From<Bz2Error> for io::Error {
    fn from(err: Bz2Error) -> Self {
        match err {
            Bz2Error::Io(inner) => inner,
            other => {
                let kind = match other.kind() {
                    ErrorKind::TruncatedStream | ErrorKind::UnexpectedEndOfInput => {
                        io::ErrorKind::UnexpectedEof
                    }
                    ErrorKind::Aborted => io::ErrorKind::Interrupted,
                    ErrorKind::DecoderBroken | ErrorKind::Io => io::ErrorKind::Other,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
