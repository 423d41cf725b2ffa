//! Status stream sources
//!
//! A [`StatusStream`] delivers notifications to an [`EventAdapter`] until the
//! stream ends or the cancellation token fires. Delivery is sequential: the
//! next notification is not read until the adapter has accepted the last.
//!
//! [`LineStream`] reads the newline-delimited message format the streaming
//! service emits from any async reader, which covers piping a connected
//! client's output through stdin as well as replaying captured traffic.

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::adapter::EventAdapter;
use crate::error::Result;
use crate::event::StreamEvent;
use crate::request::SubscriptionRequest;

/// Longest message accepted from a line source
pub const DEFAULT_MAX_LINE_SIZE: usize = 1024 * 1024;

/// Outcome of a delivery loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Non-blank lines read
    pub lines: u64,
    /// Notifications handed to the adapter
    pub events: u64,
}

/// Something that pushes stream notifications into an adapter
pub trait StatusStream {
    /// Deliver notifications for `request` until the stream ends, the sink
    /// goes away, or `cancel` fires
    fn deliver(
        self,
        request: &SubscriptionRequest,
        adapter: &EventAdapter,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<DeliveryStats>> + Send;
}

/// Newline-delimited stream messages from an async reader
pub struct LineStream<R> {
    reader: R,
    max_line_size: usize,
}

impl<R> LineStream<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_line_size(mut self, max_line_size: usize) -> Self {
        self.max_line_size = max_line_size;
        self
    }
}

impl<R> StatusStream for LineStream<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn deliver(
        mut self,
        request: &SubscriptionRequest,
        adapter: &EventAdapter,
        cancel: CancellationToken,
    ) -> Result<DeliveryStats> {
        tracing::info!(endpoint = request.endpoint(), "line stream delivering");

        let mut stats = DeliveryStats::default();
        let mut buf = Vec::with_capacity(4096);

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("line stream cancelled");
                    break;
                }
                read = read_bounded_line(&mut self.reader, &mut buf, self.max_line_size) => read,
            };

            let event = match read {
                Ok(Line::Eof) => {
                    tracing::info!(lines = stats.lines, "line stream ended");
                    break;
                }
                Ok(Line::TooLong(len)) => {
                    stats.lines += 1;
                    StreamEvent::Exception(format!(
                        "stream message of {len} bytes exceeds {} byte limit",
                        self.max_line_size
                    ))
                }
                Ok(Line::Complete) => match std::str::from_utf8(&buf) {
                    Ok(text) => match StreamEvent::from_line(text) {
                        Some(event) => {
                            stats.lines += 1;
                            event
                        }
                        None => continue,
                    },
                    Err(e) => {
                        stats.lines += 1;
                        StreamEvent::Exception(format!("stream message is not UTF-8: {e}"))
                    }
                },
                Err(e) => {
                    // Read errors end the stream; report them like the client would
                    adapter
                        .on_event(StreamEvent::Exception(format!("stream read failed: {e}")))
                        .await;
                    stats.events += 1;
                    break;
                }
            };

            stats.events += 1;
            if !adapter.on_event(event).await {
                tracing::warn!("sink closed, stopping delivery");
                break;
            }
        }

        Ok(stats)
    }
}

enum Line {
    /// `buf` holds one line without its terminator
    Complete,
    /// Line was longer than the limit and has been skipped
    TooLong(usize),
    Eof,
}

/// Read one line into `buf`, storing at most `max_size` message bytes
///
/// An oversized line is consumed up to its newline and discarded, so the
/// reader stays aligned on message boundaries.
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>, max_size: usize) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut total = 0usize;
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if total == 0 {
                return Ok(Line::Eof);
            }
            break;
        }

        let (consume, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        // Room for the message plus a CRLF terminator
        if !overflow && buf.len() + consume <= max_size.saturating_add(2) {
            buf.extend_from_slice(&available[..consume]);
        } else {
            overflow = true;
        }
        total += consume;
        reader.consume(consume);

        if done {
            break;
        }
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    if overflow || buf.len() > max_size {
        buf.clear();
        return Ok(Line::TooLong(total));
    }
    Ok(Line::Complete)
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
