//! Transparent Q-encoding stream.
//!
//! [`QEncodedStream`] wraps a byte sink and/or source. Bytes written to it
//! are Q-encoded into a [`Frame`] and flushed to the sink in folded,
//! length-bounded lines; bytes read through it are decoded in place.
//!
//! Both a blocking path (`std::io::Read` / `std::io::Write`) and a
//! non-blocking path (`tokio::io::AsyncRead` / `tokio::io::AsyncWrite`) are
//! provided. Every operation takes `&mut self`, so at most one write is in
//! flight and writes reach the sink in the order they were issued.
//!
//! A flush ends the current line's bookkeeping. Writing more text for the
//! same header field after a flush starts a new encoded-word right after
//! the previous one; insert folding whitespace on the sink in between.
//!
//! # Example
//!
//! ```ignore
//! use std::io::Write;
//! use mailledger_qencode::{FrameConfig, QEncodedStream};
//!
//! let config = FrameConfig::encoded_word("utf-8")?;
//! let mut stream = QEncodedStream::with_config(Vec::new(), config);
//! stream.write_all("Grüße".as_bytes())?;
//! let sink = stream.close()?;
//! assert_eq!(sink, b"=?utf-8?Q?Gr=C3=BC=C3=9Fe?=");
//! ```

mod blocking;
mod nonblocking;

use std::ops::Range;

use crate::decode::{DecodeCarry, Decoder};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameConfig};

/// Stream that Q-encodes writes and decodes reads.
#[derive(Debug)]
pub struct QEncodedStream<S> {
    inner: S,
    frame: Frame,
    decoder: Decoder,
}

impl<S> QEncodedStream<S> {
    /// Creates a stream without markers and with default line limits.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Creates a stream with the given frame configuration.
    pub fn with_config(inner: S, config: FrameConfig) -> Self {
        Self {
            inner,
            frame: Frame::new(config),
            decoder: Decoder::new(),
        }
    }

    /// Returns the frame holding encoded bytes not yet written to the sink.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Decodes `buffer` in place, continuing any escape left open by the
    /// previous call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHexDigit`] on a malformed escape.
    pub fn decode(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let len = self.decoder.decode(buffer)?;
        tracing::trace!(input = buffer.len(), output = len, "Decoded chunk");
        Ok(len)
    }

    /// Decodes `count` bytes of `buffer` starting at `offset`, in place.
    ///
    /// Decoded bytes start at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the range is outside `buffer`,
    /// or [`Error::InvalidHexDigit`] on a malformed escape.
    pub fn decode_at(&mut self, buffer: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        let range = checked_range(buffer.len(), offset, count)?;
        self.decode(&mut buffer[range])
    }

    /// Returns the escape state carried into the next decode.
    #[must_use]
    pub const fn decode_carry(&self) -> DecodeCarry {
        self.decoder.carry()
    }

    /// Gets a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes the stream and returns the inner stream.
    ///
    /// Note: Any encoded data still in the frame will be lost.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Validates an `offset`/`count` pair against a buffer length.
pub(crate) fn checked_range(len: usize, offset: usize, count: usize) -> Result<Range<usize>> {
    if offset > len {
        return Err(Error::InvalidArgument(format!(
            "offset {offset} is out of bounds for buffer of length {len}"
        )));
    }
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(Error::InvalidArgument(format!(
            "count {count} at offset {offset} exceeds buffer of length {len}"
        ))),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_range() {
        assert_eq!(checked_range(10, 0, 10).unwrap(), 0..10);
        assert_eq!(checked_range(10, 10, 0).unwrap(), 10..10);
        assert_eq!(checked_range(10, 3, 4).unwrap(), 3..7);
    }

    #[test]
    fn test_checked_range_rejects_offset() {
        let err = checked_range(10, 11, 0).unwrap_err();
        assert!(err.to_string().contains("offset 11"));
    }

    #[test]
    fn test_checked_range_rejects_count() {
        assert!(matches!(
            checked_range(10, 5, 6),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            checked_range(10, 5, usize::MAX),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_at_sub_range() {
        let mut stream = QEncodedStream::new(());
        let mut buffer = *b"xx=41_Byy";
        let len = stream.decode_at(&mut buffer, 2, 5).unwrap();
        assert_eq!(&buffer[2..2 + len], b"A B");
        assert_eq!(&buffer[..2], b"xx");
    }

    #[test]
    fn test_decode_at_rejects_range() {
        let mut stream = QEncodedStream::new(());
        let mut buffer = *b"abc";
        assert!(matches!(
            stream.decode_at(&mut buffer, 2, 2),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(stream.decode_carry(), DecodeCarry::Clean);
    }

    #[test]
    fn test_decode_carry_between_calls() {
        let mut stream = QEncodedStream::new(());
        let mut first = *b"ab=";
        assert_eq!(stream.decode(&mut first).unwrap(), 2);
        assert_eq!(stream.decode_carry(), DecodeCarry::PendingFirstByte);

        let mut second = *b"3Dc";
        let len = stream.decode(&mut second).unwrap();
        assert_eq!(&second[..len], b"=c");
        assert_eq!(stream.decode_carry(), DecodeCarry::Clean);
    }
}
