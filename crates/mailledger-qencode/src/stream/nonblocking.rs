//! Non-blocking read and write paths over tokio I/O.
//!
//! A write is a cooperative task: encode as much as the frame holds, wait
//! for the sink to accept the frame, reset it, repeat. A sink that is
//! immediately ready costs no suspension; a sink that is not parks the
//! task until tokio wakes it. Timeouts and cancellation are left to the
//! caller and the sink.
//!
//! Dropping a write future before it completes leaves the frame as it was
//! at that moment. Bytes already handed to the sink are not recalled.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{QEncodedStream, checked_range};
use crate::encode::encode;
use crate::error::{Error, Result};

/// State of one in-flight write.
struct PendingWrite<'a, S> {
    stream: &'a mut QEncodedStream<S>,
    source: &'a [u8],
    written: usize,
}

impl<'a, S> PendingWrite<'a, S>
where
    S: AsyncWrite + Unpin,
{
    fn new(stream: &'a mut QEncodedStream<S>, source: &'a [u8]) -> Self {
        Self {
            stream,
            source,
            written: 0,
        }
    }

    async fn run(mut self) -> Result<()> {
        loop {
            self.written += encode(&mut self.stream.frame, &self.source[self.written..]);
            if self.written < self.source.len() {
                self.stream.flush_frame_async().await?;
            } else {
                return Ok(());
            }
        }
    }
}

impl<S> QEncodedStream<S>
where
    S: AsyncWrite + Unpin,
{
    /// Encodes `buffer`, writing full frames to the sink as they fill.
    ///
    /// Returns once every byte of `buffer` is encoded. The last partial
    /// frame stays buffered until [`flush_async`](Self::flush_async) or
    /// [`close_async`](Self::close_async).
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error; the write stops at that point.
    pub async fn write_async(&mut self, buffer: &[u8]) -> Result<()> {
        PendingWrite::new(self, buffer).run().await
    }

    /// Encodes `count` bytes of `buffer` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the range is outside `buffer`,
    /// before anything is encoded, or the sink's I/O error.
    pub async fn write_at_async(
        &mut self,
        buffer: &[u8],
        offset: usize,
        count: usize,
    ) -> Result<()> {
        let range = checked_range(buffer.len(), offset, count)?;
        self.write_async(&buffer[range]).await
    }

    /// Writes any buffered frame to the sink and flushes the sink.
    ///
    /// The frame restarts from an empty line, so a later write opens a new
    /// encoded-word directly after the flushed one. Callers continuing the
    /// same header field must write folding whitespace to the sink first.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub async fn flush_async(&mut self) -> Result<()> {
        self.flush_frame_async().await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Writes any buffered frame to the sink and shuts the sink down.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub async fn close_async(&mut self) -> Result<()> {
        self.flush_frame_async().await?;
        self.inner.shutdown().await?;
        tracing::debug!("Closed Q-encoded stream");
        Ok(())
    }

    async fn flush_frame_async(&mut self) -> Result<()> {
        if !self.frame.is_empty() {
            tracing::trace!(bytes = self.frame.len(), "Flushing encoded frame");
            self.inner.write_all(self.frame.as_bytes()).await?;
            self.frame.reset();
        }
        Ok(())
    }
}

impl<S> QEncodedStream<S>
where
    S: AsyncRead + Unpin,
{
    /// Reads from the source and decodes into `buffer`.
    ///
    /// Keeps reading while a chunk decodes to nothing, so `Ok(0)` only
    /// means end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHexDigit`] on a malformed escape,
    /// [`Error::TruncatedEscape`] if the source ends inside an escape, or
    /// the source's I/O error.
    pub async fn read_async(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.inner.read(buffer).await?;
            if n == 0 {
                if self.decoder.is_clean() {
                    return Ok(0);
                }
                tracing::warn!(carry = ?self.decoder.carry(), "Source ended inside escape sequence");
                return Err(Error::TruncatedEscape);
            }
            let len = self.decode(&mut buffer[..n])?;
            if len > 0 {
                return Ok(len);
            }
        }
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
    use crate::encode::encode_to_vec;
    use crate::frame::FrameConfig;
    use std::io;
    use tokio_test::io::Builder;

    fn short_frames() -> FrameConfig {
        FrameConfig::builder()
            .max_line_length(10)
            .flush_threshold(10)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_async_flushes_full_frames() {
        let mock = Builder::new()
            .write(b"aaaaaaaaaa")
            .write(b"\r\n aaaaaaaaa")
            .write(b"\r\n aaaaaa")
            .build();
        let mut stream = QEncodedStream::with_config(mock, short_frames());

        stream.write_async(&[b'a'; 25]).await.unwrap();
        assert_eq!(stream.frame().as_bytes(), b"\r\n aaaaaa");
        stream.flush_async().await.unwrap();
        assert!(stream.frame().is_empty());
    }

    #[tokio::test]
    async fn test_single_byte_async_writes_reach_sink() {
        let config = short_frames();
        let mut stream = QEncodedStream::with_config(Vec::new(), config.clone());

        for _ in 0..25 {
            stream.write_async(b"a").await.unwrap();
            assert!(stream.frame().len() <= 10 + 10 + 3);
        }
        assert_eq!(stream.get_ref(), b"aaaaaaaaaa\r\n aaaaaaaaa");

        stream.flush_async().await.unwrap();
        assert_eq!(stream.get_ref(), &encode_to_vec(&[b'a'; 25], config));
    }

    #[tokio::test]
    async fn test_write_async_small_input_stays_buffered() {
        let mock = Builder::new().write(b"=?utf-8?Q?caf=C3=A9?=").build();
        let config = FrameConfig::encoded_word("utf-8").unwrap();
        let mut stream = QEncodedStream::with_config(mock, config);

        stream.write_async("café".as_bytes()).await.unwrap();
        assert_eq!(stream.frame().as_str(), Some("=?utf-8?Q?caf=C3=A9?="));
        stream.close_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_at_async_range() {
        let mock = Builder::new().write(b"b_c").build();
        let mut stream = QEncodedStream::new(mock);
        stream.write_at_async(b"ab cd", 1, 3).await.unwrap();
        stream.flush_async().await.unwrap();

        let err = stream.write_at_async(b"ab", 1, 2).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_write_async_sink_error() {
        let mock = Builder::new()
            .write(b"aaaaaaaaaa")
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut stream = QEncodedStream::with_config(mock, short_frames());

        let err = stream.write_async(&[b'a'; 40]).await.unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_async_decodes_split_escapes() {
        let mock = Builder::new()
            .read(b"Gr=C")
            .read(b"3=BC=")
            .read(b"\r")
            .read(b"\nn_")
            .build();
        let mut stream = QEncodedStream::new(mock);

        let mut decoded = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = stream.read_async(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            decoded.extend_from_slice(&buf[..n]);
        }
        assert_eq!(decoded, "Grün ".as_bytes());
    }

    #[tokio::test]
    async fn test_read_async_truncated() {
        let mock = Builder::new().read(b"ab=").build();
        let mut stream = QEncodedStream::new(mock);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_async(&mut buf).await.unwrap(), 2);
        let err = stream.read_async(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::TruncatedEscape));
    }
}
