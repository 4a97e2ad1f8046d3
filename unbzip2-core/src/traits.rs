//! The push/step contract between a decoder and whatever drives it.
//!
//! A [`ChunkDecoder`] never blocks and never schedules anything itself. The
//! driver pushes input chunks as they arrive, signals end of input, and calls
//! [`ChunkDecoder::step`] whenever its consumer is ready for more output.
//! Threads with channels, an async task or a plain loop can all drive it.

use crate::error::Result;

/// Outcome of one [`ChunkDecoder::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// Not enough input is buffered to make progress safely.
    NeedsInput,
    /// A unit of verified decompressed output.
    Output(Vec<u8>),
    /// Input was consumed (a header or footer) but there is nothing to emit.
    Progress,
    /// All input decoded and every stream closed cleanly.
    Finished,
}

/// A streaming decoder fed with byte chunks and drained step by step.
pub trait ChunkDecoder {
    /// Queue a chunk of compressed input. Empty chunks are allowed.
    fn push_chunk(&mut self, chunk: Vec<u8>);

    /// Signal that no further input will arrive.
    fn end_input(&mut self);

    /// Attempt to produce the next unit of output.
    ///
    /// Once this returns an error the decoder is broken; later calls return
    /// [`crate::Bz2Error::DecoderBroken`] without attempting to decode.
    fn step(&mut self) -> Result<DecodeStep>;

    /// Cancel decoding. The next step reports the abort.
    fn abort(&mut self, reason: &str);

    /// Check if the decoder has finished cleanly.
    fn is_finished(&self) -> bool;

    /// Decode a complete input given as a sequence of chunks (convenience method).
    fn decode_all<I>(&mut self, chunks: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = Vec<u8>>,
        Self: Sized,
    {
        let mut output = Vec::new();
        let mut chunks = chunks.into_iter();

        loop {
            match self.step()? {
                DecodeStep::Output(data) => output.extend_from_slice(&data),
                DecodeStep::Progress => continue,
                DecodeStep::Finished => break,
                DecodeStep::NeedsInput => match chunks.next() {
                    Some(chunk) => self.push_chunk(chunk),
                    None => self.end_input(),
                },
            }
        }

        Ok(output)
    }
}
