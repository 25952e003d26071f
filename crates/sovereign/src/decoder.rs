//! Record decoder for the assistant's streaming response.
//!
//! The backend writes one JSON document per record and separates records
//! with a blank line (`\n\n`, or `\r\n\r\n` when a proxy rewrites line
//! endings). Chunk boundaries coming off the wire are arbitrary: a chunk may
//! hold half a record, several records, or stop in the middle of a
//! separator or a multi-byte character.
//!
//! Framing is done on raw bytes. A newline byte never appears inside a UTF-8
//! multi-byte sequence, so a record boundary can be found without decoding,
//! and every complete record is decoded exactly once. Characters split across
//! chunks are therefore never corrupted.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use futures::Stream;

/// Longest separator (`\r\n\r\n`) minus one byte.
const SEPARATOR_OVERLAP: usize = 3;

/// Find the next record separator in `buf`.
///
/// Returns `(record_end, separator_len)`: the record occupies
/// `buf[..record_end]` and the separator ends at `record_end + separator_len`.
fn find_separator(buf: &[u8]) -> Option<(usize, usize)> {
    let mut pos = 0;
    while let Some(offset) = buf[pos..].iter().position(|&b| b == b'\n') {
        let nl = pos + offset;
        let rest = &buf[nl + 1..];

        // "\n\n" or "\n\r\n"
        let tail = if rest.first() == Some(&b'\n') {
            Some(1)
        } else if rest.starts_with(b"\r\n") {
            Some(2)
        } else {
            None
        };

        if let Some(tail) = tail {
            // Fold a preceding "\r" into the separator so the record text
            // does not end in a stray carriage return.
            let start = if nl > 0 && buf[nl - 1] == b'\r' {
                nl - 1
            } else {
                nl
            };
            return Some((start, nl + 1 + tail - start));
        }

        pos = nl + 1;
    }
    None
}

/// Decode one framed record, returning `None` when it is blank.
fn decode_record(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A stream adapter that turns a byte stream into decoded text records.
///
/// Yields records in arrival order. Blank records are skipped. On end of
/// stream, any buffered remainder is yielded as a final record (the backend
/// may close the connection without a trailing separator). An error from the
/// inner stream is forwarded once and ends the record stream.
pub struct RecordStream<S> {
    inner: S,
    buffer: BytesMut,
    /// Prefix of `buffer` already searched without finding a separator.
    scanned: usize,
    done: bool,
}

impl<S> RecordStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            scanned: 0,
            done: false,
        }
    }

    /// Pop the next complete, non-blank record from the buffer.
    ///
    /// The search resumes where the previous one stopped, backing up far
    /// enough to catch a separator that straddles the old end of the buffer.
    fn next_buffered(&mut self) -> Option<String> {
        loop {
            let from = self.scanned.saturating_sub(SEPARATOR_OVERLAP);
            let Some((end, sep_len)) = find_separator(&self.buffer[from..]) else {
                self.scanned = self.buffer.len();
                return None;
            };
            let raw = self.buffer.split_to(from + end);
            self.buffer.advance(sep_len);
            self.scanned = 0;
            if let Some(record) = decode_record(&raw) {
                return Some(record);
            }
        }
    }
}

impl<S, E> Stream for RecordStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            if let Some(record) = self.next_buffered() {
                return Poll::Ready(Some(Ok(record)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    self.buffer.clear();
                    self.scanned = 0;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    self.scanned = 0;
                    let rest = std::mem::take(&mut self.buffer);
                    return Poll::Ready(decode_record(&rest).map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
