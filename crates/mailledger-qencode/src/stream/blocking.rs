//! Blocking read and write paths.

use std::io::{self, Read, Write};

use super::{QEncodedStream, checked_range};
use crate::encode::encode;
use crate::error::{Error, Result};

impl<S: Write> QEncodedStream<S> {
    /// Encodes `count` bytes of `buffer` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the range is outside `buffer`,
    /// before anything is encoded, or the sink's I/O error.
    pub fn write_at(&mut self, buffer: &[u8], offset: usize, count: usize) -> Result<()> {
        let range = checked_range(buffer.len(), offset, count)?;
        self.write_encoded(&buffer[range])?;
        Ok(())
    }

    /// Flushes the frame and the sink, then returns the sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub fn close(mut self) -> Result<S> {
        self.flush()?;
        tracing::debug!("Closed Q-encoded stream");
        Ok(self.inner)
    }

    fn write_encoded(&mut self, buffer: &[u8]) -> io::Result<()> {
        let mut written = 0;
        loop {
            written += encode(&mut self.frame, &buffer[written..]);
            if written < buffer.len() {
                self.flush_frame()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn flush_frame(&mut self) -> io::Result<()> {
        if !self.frame.is_empty() {
            tracing::trace!(bytes = self.frame.len(), "Flushing encoded frame");
            self.inner.write_all(self.frame.as_bytes())?;
            self.frame.reset();
        }
        Ok(())
    }
}

impl<S: Write> Write for QEncodedStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_encoded(buf)?;
        Ok(buf.len())
    }

    /// Writes any buffered frame to the sink and flushes the sink.
    ///
    /// The frame restarts from an empty line, so a later write opens a new
    /// encoded-word directly after the flushed one. Callers continuing the
    /// same header field must write folding whitespace to the sink first.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_frame()?;
        self.inner.flush()
    }
}

impl<S: Read> Read for QEncodedStream<S> {
    /// Reads from the source and decodes in place.
    ///
    /// Keeps reading while a chunk decodes to nothing (a lone partial
    /// escape or soft line break), so `Ok(0)` only means end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                if self.decoder.is_clean() {
                    return Ok(0);
                }
                tracing::warn!(carry = ?self.decoder.carry(), "Source ended inside escape sequence");
                return Err(Error::TruncatedEscape.into());
            }
            let len = self.decode(&mut buf[..n])?;
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
    use crate::frame::{FOLD_LENGTH, FrameConfig};
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per call.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Sink that counts write calls and fails after `fail_after` of them.
    struct FlakySink {
        written: Vec<u8>,
        writes: usize,
        fail_after: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes == self.fail_after {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            self.writes += 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn utf8() -> FrameConfig {
        FrameConfig::encoded_word("utf-8").unwrap()
    }

    #[test]
    fn test_write_buffers_until_flush() {
        let mut stream = QEncodedStream::with_config(Vec::new(), utf8());
        stream.write_all(b"Hello World").unwrap();
        assert!(stream.get_ref().is_empty());
        assert_eq!(stream.frame().as_str(), Some("=?utf-8?Q?Hello_World?="));

        stream.flush().unwrap();
        assert_eq!(stream.get_ref(), b"=?utf-8?Q?Hello_World?=");
        assert!(stream.frame().is_empty());
    }

    #[test]
    fn test_write_reports_full_length() {
        let config = FrameConfig::builder().flush_threshold(16).build().unwrap();
        let mut stream = QEncodedStream::with_config(Vec::new(), config);
        let input = vec![b'x'; 1000];
        assert_eq!(stream.write(&input).unwrap(), 1000);
    }

    #[test]
    fn test_write_flushes_full_frames() {
        let config = FrameConfig::builder()
            .max_line_length(10)
            .flush_threshold(10)
            .build()
            .unwrap();
        let mut stream = QEncodedStream::with_config(Vec::new(), config);
        stream.write_all(&[b'a'; 25]).unwrap();
        assert_eq!(stream.get_ref(), b"aaaaaaaaaa\r\n aaaaaaaaa");
        assert_eq!(stream.frame().as_bytes(), b"\r\n aaaaaa");

        let sink = stream.close().unwrap();
        assert_eq!(sink, b"aaaaaaaaaa\r\n aaaaaaaaa\r\n aaaaaa");
    }

    #[test]
    fn test_single_byte_writes_stay_bounded() {
        let config = FrameConfig::new();
        let limit = config.flush_threshold() + config.max_line_length() + FOLD_LENGTH;
        let mut stream = QEncodedStream::with_config(Vec::new(), config.clone());

        for _ in 0..20_000 {
            stream.write_all(b"a").unwrap();
            assert!(stream.frame().len() <= limit, "frame grew to {}", stream.frame().len());
        }
        assert!(!stream.get_ref().is_empty());

        let sink = stream.close().unwrap();
        assert_eq!(sink, encode_to_vec(&[b'a'; 20_000], config));
    }

    #[test]
    fn test_flush_ends_word_and_next_write_starts_new_one() {
        // Words are adjacent on the sink; the caller separates them.
        let mut stream = QEncodedStream::with_config(Vec::new(), utf8());
        stream.write_all(b"one").unwrap();
        stream.flush().unwrap();
        stream.write_all(b"two").unwrap();
        assert_eq!(stream.frame().as_str(), Some("=?utf-8?Q?two?="));
        let sink = stream.close().unwrap();
        assert_eq!(sink, b"=?utf-8?Q?one?==?utf-8?Q?two?=");
    }

    #[test]
    fn test_flush_empty_frame_writes_nothing() {
        let sink = FlakySink {
            written: Vec::new(),
            writes: 0,
            fail_after: usize::MAX,
        };
        let mut stream = QEncodedStream::new(sink);
        stream.flush().unwrap();
        assert_eq!(stream.get_ref().writes, 0);
    }

    #[test]
    fn test_write_at() {
        let mut stream = QEncodedStream::new(Vec::new());
        stream.write_at(b"xxab cyy", 2, 4).unwrap();
        assert_eq!(stream.close().unwrap(), b"ab_c");
    }

    #[test]
    fn test_write_at_rejects_range_before_encoding() {
        let mut stream = QEncodedStream::new(Vec::new());
        let err = stream.write_at(b"abc", 4, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = stream.write_at(b"abc", 1, 3).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(stream.frame().is_empty());
    }

    #[test]
    fn test_sink_error_propagates_unchanged() {
        let config = FrameConfig::builder()
            .max_line_length(10)
            .flush_threshold(10)
            .build()
            .unwrap();
        let sink = FlakySink {
            written: Vec::new(),
            writes: 0,
            fail_after: 1,
        };
        let mut stream = QEncodedStream::with_config(sink, config);
        let err = stream.write(&[b'a'; 40]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "sink closed");
        assert_eq!(stream.get_ref().written, b"aaaaaaaaaa");
    }

    #[test]
    fn test_read_decodes() {
        let mut stream = QEncodedStream::new(Cursor::new(b"caf=C3=A9_au_lait".to_vec()));
        let mut decoded = Vec::new();
        stream.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, "café au lait".as_bytes());
    }

    #[test]
    fn test_read_across_chunk_boundaries() {
        let encoded = b"a=3Db=\r\nc=0D=0Ad_e".to_vec();
        for chunk in 1..=encoded.len() {
            let reader = ChunkedReader {
                data: encoded.clone(),
                pos: 0,
                chunk,
            };
            let mut stream = QEncodedStream::new(reader);
            let mut decoded = Vec::new();
            stream.read_to_end(&mut decoded).unwrap();
            assert_eq!(decoded, b"a=bc\r\nd e", "chunk size {chunk}");
        }
    }

    #[test]
    fn test_read_truncated_escape() {
        let mut stream = QEncodedStream::new(Cursor::new(b"abc=4".to_vec()));
        let mut decoded = Vec::new();
        let err = stream.read_to_end(&mut decoded).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(decoded, b"abc");
    }

    #[test]
    fn test_read_invalid_escape() {
        let mut stream = QEncodedStream::new(Cursor::new(b"=ZZ".to_vec()));
        let mut buf = [0u8; 16];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
