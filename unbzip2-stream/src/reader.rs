//! Pull-based adapters over [`StreamingDecoder`].

use crate::stream::StreamingDecoder;
use std::io::{self, Read};
use unbzip2_core::error::Result;
use unbzip2_core::traits::{ChunkDecoder, DecodeStep};

/// Default size of the reads issued against the compressed source (32KB).
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// A [`Read`] adapter that decompresses bzip2 data from an inner reader.
///
/// The decoder is only stepped when a caller's `read` needs more output, so
/// a slow consumer throttles how much compressed input is pulled.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use unbzip2_stream::Bz2Reader;
///
/// let compressed: &[u8] = &[
///     0x42, 0x5A, 0x68, 0x39, 0x17, 0x72, 0x45, 0x38, 0x50, 0x90, 0, 0, 0, 0,
/// ];
/// let mut reader = Bz2Reader::new(compressed);
/// let mut output = Vec::new();
/// reader.read_to_end(&mut output).unwrap();
/// assert!(output.is_empty());
/// ```
#[derive(Debug)]
pub struct Bz2Reader<R: Read> {
    inner: R,
    decoder: StreamingDecoder,
    input: Vec<u8>,
    output: Vec<u8>,
    output_pos: usize,
    done: bool,
}

impl<R: Read> Bz2Reader<R> {
    /// Wrap `inner` with a default decoder.
    pub fn new(inner: R) -> Self {
        Self::with_decoder(inner, StreamingDecoder::new(), DEFAULT_BUFFER_SIZE)
    }

    /// Wrap `inner` with a configured decoder and read size.
    pub fn with_decoder(inner: R, decoder: StreamingDecoder, buffer_size: usize) -> Self {
        Self {
            inner,
            decoder,
            input: vec![0u8; buffer_size.max(1)],
            output: Vec::new(),
            output_pos: 0,
            done: false,
        }
    }

    /// Get a reference to the decoder.
    pub fn decoder(&self) -> &StreamingDecoder {
        &self.decoder
    }

    /// Get a reference to the inner reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the adapter and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill_output(&mut self) -> io::Result<()> {
        while self.output_pos >= self.output.len() && !self.done {
            match self.decoder.step()? {
                DecodeStep::NeedsInput => {
                    let n = match self.inner.read(&mut self.input) {
                        Ok(n) => n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            self.decoder.abort("input read failed");
                            return Err(e);
                        }
                    };
                    if n == 0 {
                        self.decoder.end_input();
                    } else {
                        self.decoder.push_chunk(self.input[..n].to_vec());
                    }
                }
                DecodeStep::Output(data) => {
                    self.output = data;
                    self.output_pos = 0;
                }
                DecodeStep::Progress => {}
                DecodeStep::Finished => self.done = true,
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for Bz2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.fill_output()?;

        let available = &self.output[self.output_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.output_pos += n;
        Ok(n)
    }
}

/// Decompress a complete in-memory input.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = StreamingDecoder::new();
    decoder.decode_all(std::iter::once(data.to_vec()))
}

/// Decompress an input delivered as a sequence of chunks.
pub fn decompress_chunks<I>(chunks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    StreamingDecoder::new().decode_all(chunks)
}

/// Decompress everything readable from `reader`.
pub fn decompress_reader<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut decoder = StreamingDecoder::new();
    let mut input = reader;
    let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
    let mut output = Vec::new();

    loop {
        match decoder.step()? {
            DecodeStep::NeedsInput => {
                let n = loop {
                    match input.read(&mut buffer) {
                        Ok(n) => break n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e.into()),
                    }
                };
                if n == 0 {
                    decoder.end_input();
                } else {
                    decoder.push_chunk(buffer[..n].to_vec());
                }
            }
            DecodeStep::Output(data) => output.extend_from_slice(&data),
            DecodeStep::Progress => {}
            DecodeStep::Finished => return Ok(output),
        }
    }
}
