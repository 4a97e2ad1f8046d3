//! Async adapters for [`ChunkDecoder`]s.
//!
//! The decoder itself is synchronous and non-blocking; these helpers supply
//! the suspension points. [`decode_async`] copies an `AsyncRead` through a
//! decoder into an `AsyncWrite`, so a slow writer naturally throttles how
//! fast input is read. [`pump_channels`] connects a producer task and a
//! consumer task through bounded channels, which is the shape to use when
//! input and output are driven by independent schedules.
//!
//! # Example
//!
//! ```rust,ignore
//! use unbzip2_core::async_io::{InputEvent, spawn_pump};
//!
//! let (input, mut output, handle) = spawn_pump(decoder, 8);
//! input.send(InputEvent::Chunk(bytes)).await?;
//! input.send(InputEvent::End).await?;
//! while let Some(chunk) = output.recv().await {
//!     sink.write_all(&chunk?).await?;
//! }
//! ```
//!
//! # Feature Flag
//!
//! This module is only available when the `async-io` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! unbzip2-core = { version = "0.1.0", features = ["async-io"] }
//! ```

use crate::error::{ErrorKind, Result};
use crate::traits::{ChunkDecoder, DecodeStep};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Default buffer size for async operations (32KB).
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Decode everything readable from `input` into `output`.
///
/// Returns the number of decompressed bytes written.
///
/// # Errors
///
/// Returns the decoder's error, or an I/O error from either side. A failed
/// write aborts the decoder.
pub async fn decode_async<D, R, W>(decoder: &mut D, input: &mut R, output: &mut W) -> Result<u64>
where
    D: ChunkDecoder + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    decode_async_with_buffer(decoder, input, output, DEFAULT_BUFFER_SIZE).await
}

/// Same as [`decode_async`] with a custom read buffer size.
pub async fn decode_async_with_buffer<D, R, W>(
    decoder: &mut D,
    input: &mut R,
    output: &mut W,
    buffer_size: usize,
) -> Result<u64>
where
    D: ChunkDecoder + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_written = 0u64;

    loop {
        match decoder.step()? {
            DecodeStep::NeedsInput => {
                let bytes_read = match input.read(&mut buffer).await {
                    Ok(n) => n,
                    Err(e) => {
                        decoder.abort("input read failed");
                        return Err(e.into());
                    }
                };
                if bytes_read == 0 {
                    decoder.end_input();
                } else {
                    decoder.push_chunk(buffer[..bytes_read].to_vec());
                }
            }
            DecodeStep::Output(data) => {
                if let Err(e) = output.write_all(&data).await {
                    decoder.abort("output write failed");
                    return Err(e.into());
                }
                total_written += data.len() as u64;
            }
            DecodeStep::Progress => {}
            DecodeStep::Finished => {
                output.flush().await?;
                return Ok(total_written);
            }
        }
    }
}

/// A message from the producer side of [`pump_channels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// More compressed input.
    Chunk(Vec<u8>),
    /// The input is complete.
    End,
    /// The producer gave up; decoding must stop.
    Abort(String),
}

/// Producer half of a pump input channel.
///
/// Chunks and the end marker queue behind each other in a bounded channel.
/// An abort skips the queue: the pump sees it before its next decode step,
/// even while it is still working through buffered input.
#[derive(Debug)]
pub struct InputSender {
    events: mpsc::Sender<InputEvent>,
    abort: watch::Sender<Option<String>>,
}

impl InputSender {
    /// Send an event, waiting for room in the channel.
    ///
    /// [`InputEvent::Abort`] never waits; it behaves like [`Self::abort`].
    ///
    /// # Errors
    ///
    /// Fails with the event when the pump has stopped accepting input.
    pub async fn send(&self, event: InputEvent) -> std::result::Result<(), SendError<InputEvent>> {
        match event {
            InputEvent::Abort(reason) => self.abort(reason),
            event => self.events.send(event).await,
        }
    }

    /// Ask the pump to stop decoding.
    ///
    /// # Errors
    ///
    /// Fails when the pump has already stopped accepting input.
    pub fn abort(&self, reason: impl Into<String>) -> std::result::Result<(), SendError<InputEvent>> {
        let reason = reason.into();
        if self.events.is_closed() {
            return Err(SendError(InputEvent::Abort(reason)));
        }
        self.abort.send_replace(Some(reason));
        Ok(())
    }

    /// Whether the pump has stopped accepting input.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Pump half of a pump input channel.
#[derive(Debug)]
pub struct InputReceiver {
    events: mpsc::Receiver<InputEvent>,
    abort: AbortWatch,
}

impl InputReceiver {
    fn close(&mut self) {
        self.events.close();
    }
}

#[derive(Debug)]
struct AbortWatch {
    rx: watch::Receiver<Option<String>>,
    sender_alive: bool,
}

impl AbortWatch {
    fn requested(&mut self) -> Option<String> {
        self.rx.borrow_and_update().clone()
    }

    /// Resolves once an abort reason is set; never resolves after the
    /// sender is gone.
    async fn cancelled(&mut self) {
        loop {
            if !self.sender_alive {
                std::future::pending::<()>().await;
            }
            if self.rx.changed().await.is_err() {
                self.sender_alive = false;
                continue;
            }
            if self.rx.borrow().is_some() {
                return;
            }
        }
    }
}

/// Create a bounded input channel for [`pump_channels`].
pub fn input_channel(capacity: usize) -> (InputSender, InputReceiver) {
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (abort_tx, abort_rx) = watch::channel(None);
    (
        InputSender {
            events: events_tx,
            abort: abort_tx,
        },
        InputReceiver {
            events: events_rx,
            abort: AbortWatch {
                rx: abort_rx,
                sender_alive: true,
            },
        },
    )
}

/// How a [`pump_channels`] run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Every stream closed cleanly; the output channel was closed normally.
    Finished,
    /// An error of this kind was delivered to the consumer.
    Failed(ErrorKind),
    /// The consumer went away before decoding finished.
    ConsumerGone,
}

/// Summary returned by [`pump_channels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSummary {
    /// Decompressed bytes delivered to the consumer.
    pub bytes_out: u64,
    /// Terminal outcome.
    pub outcome: PumpOutcome,
}

/// Drive `decoder` between a producer channel and a consumer channel.
///
/// Output is sent only when the bounded output channel has room, and input
/// is received only when the decoder asks for it, so both sides apply
/// backpressure. A clean end is signalled by closing the output channel;
/// an error is delivered as a single `Err` item before closing.
///
/// Cancellation: an abort from the [`InputSender`], a producer that drops
/// its sender without [`InputEvent::End`], or a consumer that drops its
/// receiver all abort the decoder and close the input channel so the
/// producer stops. An abort is checked before every decode step and while
/// waiting on either channel, so no output is sent once it has been seen.
pub async fn pump_channels<D>(
    mut decoder: D,
    mut input: InputReceiver,
    output: mpsc::Sender<Result<Vec<u8>>>,
) -> PumpSummary
where
    D: ChunkDecoder,
{
    let mut bytes_out = 0u64;

    loop {
        if let Some(reason) = input.abort.requested() {
            decoder.abort(&reason);
        }

        let step = match decoder.step() {
            Ok(step) => step,
            Err(err) => {
                input.close();
                let kind = err.kind();
                if output.send(Err(err)).await.is_err() {
                    return PumpSummary {
                        bytes_out,
                        outcome: PumpOutcome::ConsumerGone,
                    };
                }
                return PumpSummary {
                    bytes_out,
                    outcome: PumpOutcome::Failed(kind),
                };
            }
        };

        match step {
            DecodeStep::NeedsInput => {
                let event = tokio::select! {
                    biased;
                    _ = input.abort.cancelled() => continue,
                    _ = output.closed() => {
                        decoder.abort("consumer dropped the output");
                        input.close();
                        return PumpSummary {
                            bytes_out,
                            outcome: PumpOutcome::ConsumerGone,
                        };
                    }
                    event = input.events.recv() => event,
                };
                match event {
                    Some(InputEvent::Chunk(chunk)) => decoder.push_chunk(chunk),
                    Some(InputEvent::End) => decoder.end_input(),
                    Some(InputEvent::Abort(reason)) => decoder.abort(&reason),
                    None => decoder.abort("input closed without end of input"),
                }
            }
            DecodeStep::Output(data) => {
                let len = data.len() as u64;
                let sent = tokio::select! {
                    biased;
                    _ = input.abort.cancelled() => continue,
                    sent = output.send(Ok(data)) => sent,
                };
                if sent.is_err() {
                    decoder.abort("consumer dropped the output");
                    input.close();
                    return PumpSummary {
                        bytes_out,
                        outcome: PumpOutcome::ConsumerGone,
                    };
                }
                bytes_out += len;
            }
            DecodeStep::Progress => {}
            DecodeStep::Finished => {
                return PumpSummary {
                    bytes_out,
                    outcome: PumpOutcome::Finished,
                };
            }
        }
    }
}

/// Spawn [`pump_channels`] on the current tokio runtime.
///
/// Returns the producer's sender, the consumer's receiver and the task
/// handle. `capacity` bounds both channels.
pub fn spawn_pump<D>(
    decoder: D,
    capacity: usize,
) -> (
    InputSender,
    mpsc::Receiver<Result<Vec<u8>>>,
    JoinHandle<PumpSummary>,
)
where
    D: ChunkDecoder + Send + 'static,
{
    let (input_tx, input_rx) = input_channel(capacity);
    let (output_tx, output_rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(pump_channels(decoder, input_rx, output_tx));
    (input_tx, output_rx, handle)
}

/// Collect everything a consumer channel delivers.
///
/// Returns the concatenated output on a clean end, or the delivered error.
pub async fn collect_output(mut output: mpsc::Receiver<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(item) = output.recv().await {
        data.extend_from_slice(&item?);
    }
    Ok(data)
}
