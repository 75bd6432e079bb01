//! Integration tests for the Q-encoding stream.
//!
//! These tests drive the public API against in-memory sinks and sources,
//! including a sink that only accepts data after a wakeup.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{self, Read, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use proptest::prelude::*;
use tokio::io::AsyncWrite;

use mailledger_qencode::{
    Error, FrameConfig, QEncodedStream, decode_to_vec, encode_to_vec,
};

const HEADER: &[u8] = b"=?utf-8?Q?";
const FOOTER: &[u8] = b"?=";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mailledger_qencode=trace")
        .with_test_writer()
        .try_init();
}

/// Sink that returns `Pending` before accepting each write.
#[derive(Default)]
struct SlowSink {
    /// Buffers accepted by each successful write.
    sent: Vec<Vec<u8>>,
    /// Number of times a write was parked.
    parked: usize,
    ready: bool,
}

impl SlowSink {
    fn concat(&self) -> Vec<u8> {
        self.sent.concat()
    }
}

impl AsyncWrite for SlowSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.ready {
            self.ready = true;
            self.parked += 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.ready = false;
        self.sent.push(buf.to_vec());
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reader that hands out at most `chunk` bytes per call.
struct ChunkedReader<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Removes folds and markers, leaving the concatenated payloads.
fn unfold(encoded: &[u8], header: &[u8], footer: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut rest = encoded;
    let mut first = true;
    loop {
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        let mut line = &rest[..end];
        if !first {
            line = line.strip_prefix(b" ").expect("continuation space");
        }
        let line = line.strip_prefix(header).expect("header marker");
        let line = line.strip_suffix(footer).expect("footer marker");
        payload.extend_from_slice(line);
        first = false;
        if end == rest.len() {
            break;
        }
        rest = &rest[end + 2..];
    }
    payload
}

fn line_lengths(encoded: &[u8]) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut rest = encoded;
    while let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") {
        lengths.push(pos);
        rest = &rest[pos + 2..];
    }
    lengths.push(rest.len());
    lengths
}

#[test]
fn test_subject_round_trip() {
    let subject = "Réunion: ordre du jour, café & croissants — 10h30 salle Étoile";
    let config = FrameConfig::encoded_word("utf-8").unwrap();
    let encoded = encode_to_vec(subject.as_bytes(), config);

    assert!(line_lengths(&encoded).iter().all(|&len| len <= 76));
    assert!(line_lengths(&encoded).len() > 1);

    let decoded = decode_to_vec(&unfold(&encoded, HEADER, FOOTER)).unwrap();
    assert_eq!(decoded, subject.as_bytes());
}

#[test]
fn test_blocking_stream_round_trip() {
    init_tracing();
    let config = FrameConfig::encoded_word("utf-8").unwrap();
    let mut stream = QEncodedStream::with_config(Vec::new(), config);
    for word in ["Ключевые ", "слова ", "и ", "Überschrift"] {
        stream.write_all(word.as_bytes()).unwrap();
    }
    let encoded = stream.close().unwrap();

    let payload = unfold(&encoded, HEADER, FOOTER);
    let mut reader = QEncodedStream::new(ChunkedReader {
        data: &payload,
        chunk: 3,
    });
    let mut decoded = String::new();
    reader.read_to_string(&mut decoded).unwrap();
    assert_eq!(decoded, "Ключевые слова и Überschrift");
}

#[tokio::test]
async fn test_async_write_waits_for_slow_sink() {
    init_tracing();
    let config = FrameConfig::builder()
        .max_line_length(10)
        .flush_threshold(10)
        .build()
        .unwrap();
    let mut stream = QEncodedStream::with_config(SlowSink::default(), config);

    stream.write_async(&[b'a'; 25]).await.unwrap();
    assert_eq!(
        stream.get_ref().sent,
        vec![b"aaaaaaaaaa".to_vec(), b"\r\n aaaaaaaaa".to_vec()]
    );
    assert_eq!(stream.get_ref().parked, 2);

    stream.flush_async().await.unwrap();
    assert_eq!(stream.get_ref().sent.len(), 3);
    assert_eq!(
        stream.get_ref().concat(),
        encode_to_vec(&[b'a'; 25], FrameConfig::builder().max_line_length(10).build().unwrap())
    );
}

#[tokio::test]
async fn test_async_matches_blocking_output() {
    let text = "Grüße ".repeat(50);
    let config = FrameConfig::builder()
        .header("=?utf-8?Q?")
        .footer("?=")
        .flush_threshold(64)
        .build()
        .unwrap();

    let mut blocking = QEncodedStream::with_config(Vec::new(), config.clone());
    blocking.write_all(text.as_bytes()).unwrap();
    let expected = blocking.close().unwrap();

    let mut stream = QEncodedStream::with_config(SlowSink::default(), config);
    stream.write_async(text.as_bytes()).await.unwrap();
    stream.close_async().await.unwrap();

    assert!(stream.get_ref().sent.len() > 1);
    assert_eq!(stream.get_ref().concat(), expected);
}

#[tokio::test]
async fn test_async_range_validated_before_encoding() {
    let mut stream = QEncodedStream::new(SlowSink::default());
    let err = stream.write_at_async(b"abc", 2, 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(stream.frame().is_empty());
    assert_eq!(stream.get_ref().parked, 0);
}

#[cfg(feature = "serde")]
#[test]
fn test_config_from_json() {
    let config: FrameConfig = serde_json::from_str(
        r#"{"header": "=?utf-8?Q?", "footer": "?=", "max_line_length": 40}"#,
    )
    .unwrap();
    assert_eq!(config.header(), HEADER);
    assert_eq!(config.max_line_length(), 40);

    let result: Result<FrameConfig, _> = serde_json::from_str(r#"{"max_line_length": 3}"#);
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn prop_round_trip_without_folding(input in proptest::collection::vec(any::<u8>(), 0..512)) {
        let config = FrameConfig::builder().max_line_length(1 << 20).build().unwrap();
        let encoded = encode_to_vec(&input, config);
        prop_assert!(!encoded.contains(&b'\n'));
        prop_assert_eq!(decode_to_vec(&encoded).unwrap(), input);
    }

    #[test]
    fn prop_folded_lines_bounded(
        input in proptest::collection::vec(any::<u8>(), 1..600),
        max_line_length in 19usize..120,
        flush_threshold in 1usize..256,
    ) {
        let config = FrameConfig::builder()
            .header("=?utf-8?Q?")
            .footer("?=")
            .max_line_length(max_line_length)
            .flush_threshold(flush_threshold)
            .build()
            .unwrap();
        let encoded = encode_to_vec(&input, config);

        for len in line_lengths(&encoded) {
            prop_assert!(len <= max_line_length);
        }
        let payload = unfold(&encoded, HEADER, FOOTER);
        prop_assert_eq!(decode_to_vec(&payload).unwrap(), input);
    }

    #[test]
    fn prop_decode_any_chunking(
        input in proptest::collection::vec(any::<u8>(), 0..256),
        chunk in 1usize..8,
    ) {
        let config = FrameConfig::builder().max_line_length(1 << 20).build().unwrap();
        let encoded = encode_to_vec(&input, config);

        let mut stream = QEncodedStream::new(ChunkedReader { data: &encoded, chunk });
        let mut decoded = Vec::new();
        stream.read_to_end(&mut decoded).unwrap();
        prop_assert_eq!(decoded, input);
    }
}
