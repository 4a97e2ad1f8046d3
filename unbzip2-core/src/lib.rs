//! # unbzip2 Core
//!
//! Core components for the unbzip2-stream decoder.
//!
//! This crate provides the format-independent building blocks:
//!
//! - [`bitstream`]: MSB-first bit reading over a queue of byte chunks
//! - [`crc`]: CRC-32/BZIP2 and the per-stream combined CRC
//! - [`traits`]: The push/step contract shared by decoders and adapters
//! - [`error`]: Error types
//! - `async_io`: Tokio adapters (feature `async-io`)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Adapters                                                │
//! │     io::Read pull adapter, tokio channels / AsyncRead   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Coordinator + Codec (unbzip2-stream)                    │
//! │     lookahead policy, header/block/footer parsing       │
//! ├─────────────────────────────────────────────────────────┤
//! │ BitStream (this crate)                                  │
//! │     chunked BitReader, CRC, ChunkDecoder trait          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::collections::VecDeque;
//! use unbzip2_core::bitstream::BitReader;
//! use unbzip2_core::crc::Bz2Crc;
//!
//! let mut reader = BitReader::new(VecDeque::from(vec![b"BZh9".to_vec()]));
//! assert_eq!(reader.read_bits(24).unwrap(), 0x425A68);
//!
//! assert_eq!(Bz2Crc::compute(b"123456789"), 0xFC891918);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "async-io")]
pub mod async_io;
pub mod bitstream;
pub mod crc;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, ChunkSource, PullFn};
pub use crc::{Bz2Crc, StreamCrc, combine_stream_crc};
pub use error::{Bz2Error, ErrorKind, Result};
pub use traits::{ChunkDecoder, DecodeStep};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, ChunkSource};
    pub use crate::crc::{Bz2Crc, StreamCrc};
    pub use crate::error::{Bz2Error, ErrorKind, Result};
    pub use crate::traits::{ChunkDecoder, DecodeStep};
}
