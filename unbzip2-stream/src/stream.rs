//! Streaming coordinator.
//!
//! [`StreamingDecoder`] owns the pending-input queue and decides when it is
//! safe to parse. Until the caller signals end of input it only attempts a
//! unit once enough bytes are buffered that a block cannot run out of input
//! halfway; afterwards it drains every remaining unit and checks that the
//! input ended exactly at a stream boundary.

use crate::decode::{Bz2Parser, Unit};
use crate::BlockSize;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};
use unbzip2_core::error::{Bz2Error, ErrorKind, Result};
use unbzip2_core::traits::{ChunkDecoder, DecodeStep};
use unbzip2_core::BitReader;

/// Buffering policy of a [`StreamingDecoder`].
///
/// Before parsing a unit while more input may still arrive, the decoder
/// waits for `lookahead_base + lookahead_per_level * max(level,
/// min_level_for_lookahead)` unconsumed bytes, where `level` is the current
/// stream's block size (or `min_level_for_lookahead` before a header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Fixed allowance for block header and table overhead.
    pub lookahead_base: usize,
    /// Allowance per block-size level.
    pub lookahead_per_level: usize,
    /// Smallest level used in the calculation.
    pub min_level_for_lookahead: u8,
}

impl DecoderConfig {
    /// Bytes that must be buffered before parsing a unit of a stream with
    /// the given block size.
    pub fn required_lookahead(&self, block_size: Option<BlockSize>) -> usize {
        let level = block_size
            .map_or(self.min_level_for_lookahead, |size| size.level())
            .max(self.min_level_for_lookahead);
        self.lookahead_base
            .saturating_add(self.lookahead_per_level.saturating_mul(level as usize))
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            lookahead_base: 25_000,
            lookahead_per_level: 100_000,
            min_level_for_lookahead: 4,
        }
    }
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Expecting a stream header (at the start, or after a footer).
    AwaitingHeader,
    /// Inside a stream, expecting a block or the footer.
    DecodingBlocks,
    /// Input ended cleanly at a stream boundary.
    Closed,
    /// An error was reported; no further decoding happens.
    Broken,
}

/// Counters describing a decoder's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Streams closed by a verified footer.
    pub streams_completed: u64,
    /// Blocks decoded and verified.
    pub blocks_decoded: u64,
    /// Decompressed bytes emitted.
    pub bytes_out: u64,
    /// Compressed bytes pushed by the caller.
    pub bytes_received: u64,
    /// Compressed bytes consumed by the parser.
    pub bytes_consumed: u64,
    /// Block size of the current stream.
    pub block_size: Option<BlockSize>,
}

/// Push-driven bzip2 decoder.
///
/// # Example
///
/// ```
/// use unbzip2_stream::{ChunkDecoder, StreamingDecoder};
///
/// let empty_stream = vec![
///     0x42, 0x5A, 0x68, 0x31, 0x17, 0x72, 0x45, 0x38, 0x50, 0x90, 0, 0, 0, 0,
/// ];
/// let mut decoder = StreamingDecoder::new();
/// let output = decoder.decode_all(empty_stream.chunks(3).map(<[u8]>::to_vec)).unwrap();
/// assert!(output.is_empty());
/// assert!(decoder.is_finished());
/// ```
#[derive(Debug)]
pub struct StreamingDecoder {
    reader: BitReader<VecDeque<Vec<u8>>>,
    parser: Bz2Parser,
    config: DecoderConfig,
    state: CoordinatorState,
    input_ended: bool,
    pending_abort: Option<String>,
    bytes_received: u64,
    bytes_out: u64,
}

impl StreamingDecoder {
    /// Create a decoder with the default buffering policy.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with a custom buffering policy.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            reader: BitReader::new(VecDeque::new()),
            parser: Bz2Parser::new(),
            config,
            state: CoordinatorState::AwaitingHeader,
            input_ended: false,
            pending_abort: None,
            bytes_received: 0,
            bytes_out: 0,
        }
    }

    /// Buffering policy in use.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Check if end of input has been signalled.
    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    /// Block size of the stream being decoded, if inside one.
    pub fn block_size(&self) -> Option<BlockSize> {
        self.parser.block_size()
    }

    /// Compressed bytes pushed but not yet consumed.
    pub fn buffered_bytes(&self) -> u64 {
        self.bytes_received
            .saturating_sub(self.reader.bytes_consumed())
    }

    /// Snapshot of the progress counters.
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            streams_completed: self.parser.streams_completed(),
            blocks_decoded: self.parser.blocks_decoded(),
            bytes_out: self.bytes_out,
            bytes_received: self.bytes_received,
            bytes_consumed: self.reader.bytes_consumed(),
            block_size: self.parser.block_size(),
        }
    }

    fn fail(&mut self, err: Bz2Error) -> Result<DecodeStep> {
        debug!(error = %err, "decoder broken");
        self.state = CoordinatorState::Broken;
        self.reader.source_mut().clear();
        Err(err)
    }

    fn close(&mut self) -> Result<DecodeStep> {
        debug!(
            streams = self.parser.streams_completed(),
            blocks = self.parser.blocks_decoded(),
            bytes_out = self.bytes_out,
            "decoder closed"
        );
        self.state = CoordinatorState::Closed;
        Ok(DecodeStep::Finished)
    }
}

impl Default for StreamingDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder for StreamingDecoder {
    fn push_chunk(&mut self, chunk: Vec<u8>) {
        match self.state {
            CoordinatorState::Closed | CoordinatorState::Broken => return,
            _ if self.input_ended => {
                warn!(len = chunk.len(), "chunk pushed after end of input, ignoring");
                return;
            }
            _ => {}
        }
        if chunk.is_empty() {
            return;
        }
        self.bytes_received += chunk.len() as u64;
        self.reader.source_mut().push_back(chunk);
    }

    fn end_input(&mut self) {
        self.input_ended = true;
    }

    fn step(&mut self) -> Result<DecodeStep> {
        match self.state {
            CoordinatorState::Closed => return Ok(DecodeStep::Finished),
            CoordinatorState::Broken => return Err(Bz2Error::DecoderBroken),
            _ => {}
        }

        if let Some(reason) = self.pending_abort.take() {
            return self.fail(Bz2Error::aborted(reason));
        }

        let buffered = self.buffered_bytes();
        if buffered == 0 {
            if !self.input_ended {
                return Ok(DecodeStep::NeedsInput);
            }
            return match self.state {
                CoordinatorState::DecodingBlocks => {
                    let consumed = self.reader.bytes_consumed();
                    self.fail(Bz2Error::truncated(consumed, "input stream ended prematurely"))
                }
                _ => self.close(),
            };
        }

        if !self.input_ended {
            let needed = self.config.required_lookahead(self.parser.block_size()) as u64;
            if buffered < needed {
                trace!(buffered, needed, "waiting for lookahead");
                return Ok(DecodeStep::NeedsInput);
            }
        }

        match self.parser.next_unit(&mut self.reader) {
            Ok(Unit::Header(_)) => {
                self.state = CoordinatorState::DecodingBlocks;
                Ok(DecodeStep::Progress)
            }
            Ok(Unit::Block(data)) => {
                if data.is_empty() {
                    return Ok(DecodeStep::Progress);
                }
                self.bytes_out += data.len() as u64;
                Ok(DecodeStep::Output(data))
            }
            Ok(Unit::EndOfStream { .. }) => {
                self.state = CoordinatorState::AwaitingHeader;
                Ok(DecodeStep::Progress)
            }
            Err(err) if self.input_ended && err.kind() == ErrorKind::UnexpectedEndOfInput => {
                let consumed = self.reader.bytes_consumed();
                self.fail(Bz2Error::truncated(consumed, "input ended mid-unit"))
            }
            Err(err) => self.fail(err),
        }
    }

    fn abort(&mut self, reason: &str) {
        match self.state {
            CoordinatorState::Closed | CoordinatorState::Broken => {}
            _ => {
                debug!(reason, "abort requested");
                self.pending_abort = Some(reason.to_string());
                self.reader.source_mut().clear();
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.state == CoordinatorState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{BitWriter, BlockOptions, encode_stream, write_block};
    use crate::{EOS_MAGIC, STREAM_MAGIC};
    use unbzip2_core::Bz2Crc;

    fn drain(decoder: &mut StreamingDecoder) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        loop {
            match decoder.step()? {
                DecodeStep::Output(data) => output.extend(data),
                DecodeStep::Progress => {}
                DecodeStep::Finished => return Ok(output),
                DecodeStep::NeedsInput => panic!("input already ended"),
            }
        }
    }

    #[test]
    fn test_default_lookahead() {
        let config = DecoderConfig::default();
        assert_eq!(config.required_lookahead(None), 425_000);
        assert_eq!(config.required_lookahead(BlockSize::new(1)), 425_000);
        assert_eq!(config.required_lookahead(BlockSize::new(9)), 925_000);
    }

    #[test]
    fn test_waits_for_lookahead() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(encode_stream(&[b"hello"], 1));
        assert_eq!(decoder.step().unwrap(), DecodeStep::NeedsInput);
        assert_eq!(decoder.state(), CoordinatorState::AwaitingHeader);

        decoder.end_input();
        assert_eq!(drain(&mut decoder).unwrap(), b"hello");
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_small_lookahead_decodes_before_end() {
        let data = encode_stream(&[b"first", b"second"], 1);
        let mut decoder = StreamingDecoder::with_config(DecoderConfig {
            lookahead_base: 0,
            lookahead_per_level: 0,
            min_level_for_lookahead: 1,
        });
        decoder.push_chunk(data);

        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.state(), CoordinatorState::DecodingBlocks);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Output(b"first".to_vec()));
        assert_eq!(decoder.step().unwrap(), DecodeStep::Output(b"second".to_vec()));
        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.state(), CoordinatorState::AwaitingHeader);

        // Nothing left to parse, so even a zero lookahead waits
        assert_eq!(decoder.buffered_bytes(), 0);
        assert_eq!(decoder.step().unwrap(), DecodeStep::NeedsInput);
        decoder.end_input();
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
    }

    #[test]
    fn test_empty_input_closes_cleanly() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(Vec::new());
        decoder.end_input();
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
        assert!(decoder.is_finished());
        assert_eq!(decoder.stats(), DecoderStats::default());
    }

    #[test]
    fn test_truncated_after_header() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(b"BZh9".to_vec());
        decoder.end_input();
        let err = drain(&mut decoder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedStream);
        assert_eq!(decoder.state(), CoordinatorState::Broken);
    }

    #[test]
    fn test_truncated_mid_block() {
        let data = encode_stream(&[b"some block content"], 1);
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(data[..data.len() / 2].to_vec());
        decoder.end_input();
        let err = drain(&mut decoder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedStream);
    }

    #[test]
    fn test_truncated_in_footer() {
        let data = encode_stream(&[b"some block content"], 1);
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(data[..data.len() - 3].to_vec());
        decoder.end_input();
        let err = drain(&mut decoder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedStream);
    }

    #[test]
    fn test_error_reported_once() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(b"not bzip2 at all".to_vec());
        decoder.end_input();
        assert_eq!(decoder.step().unwrap_err().kind(), ErrorKind::MalformedHeader);
        assert_eq!(decoder.step().unwrap_err().kind(), ErrorKind::DecoderBroken);
        assert_eq!(decoder.step().unwrap_err().kind(), ErrorKind::DecoderBroken);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_later_block_failure_keeps_earlier_output() {
        let mut w = BitWriter::new();
        for &byte in STREAM_MAGIC.iter().chain(b"1") {
            w.write(u64::from(byte), 8);
        }
        write_block(&mut w, b"one", &BlockOptions::default());
        let corrupt = BlockOptions {
            stored_crc: Some(Bz2Crc::compute(b"two") ^ 0x10),
            ..BlockOptions::default()
        };
        write_block(&mut w, b"two", &corrupt);
        w.write(EOS_MAGIC, 48);
        w.write(0, 32);

        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(w.finish());
        decoder.end_input();

        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Output(b"one".to_vec()));
        let err = decoder.step().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlockCrcMismatch);
        assert_eq!(decoder.state(), CoordinatorState::Broken);
        assert_eq!(decoder.step().unwrap_err().kind(), ErrorKind::DecoderBroken);
        assert_eq!(decoder.stats().bytes_out, 3);
    }

    #[test]
    fn test_abort() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(encode_stream(&[b"abc"], 1));
        decoder.abort("caller cancelled");
        match decoder.step().unwrap_err() {
            Bz2Error::Aborted { reason } => assert_eq!(reason, "caller cancelled"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(decoder.state(), CoordinatorState::Broken);
        assert_eq!(decoder.step().unwrap_err().kind(), ErrorKind::DecoderBroken);
    }

    #[test]
    fn test_abort_after_close_is_ignored() {
        let mut decoder = StreamingDecoder::new();
        decoder.end_input();
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
        decoder.abort("too late");
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
    }

    #[test]
    fn test_push_after_end_ignored() {
        let mut decoder = StreamingDecoder::new();
        decoder.end_input();
        decoder.push_chunk(b"BZh9".to_vec());
        assert_eq!(decoder.stats().bytes_received, 0);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
    }

    #[test]
    fn test_stats() {
        let mut first = encode_stream(&[b"one", b"two"], 2);
        let second = encode_stream(&[b"three"], 3);
        first.extend_from_slice(&second);
        let total = first.len() as u64;

        let mut decoder = StreamingDecoder::new();
        let output = decoder
            .decode_all(first.chunks(7).map(<[u8]>::to_vec))
            .unwrap();
        assert_eq!(output, b"onetwothree");

        let stats = decoder.stats();
        assert_eq!(stats.streams_completed, 2);
        assert_eq!(stats.blocks_decoded, 3);
        assert_eq!(stats.bytes_out, 11);
        assert_eq!(stats.bytes_received, total);
        assert_eq!(stats.bytes_consumed, total);
        assert_eq!(stats.block_size, None);
    }

    #[test]
    fn test_empty_block_emits_progress() {
        let mut decoder = StreamingDecoder::new();
        decoder.push_chunk(encode_stream(&[b""], 1));
        decoder.end_input();
        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Progress);
        assert_eq!(decoder.step().unwrap(), DecodeStep::Finished);
        assert_eq!(decoder.stats().blocks_decoded, 1);
    }
}
