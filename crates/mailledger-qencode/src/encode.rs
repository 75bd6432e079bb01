//! Incremental Q-encoding encoder.
//!
//! Only ASCII letters and digits pass through unchanged; space becomes `_`
//! and everything else is escaped as `=XX`. RFC 2047 Section 5 also allows
//! a few punctuation characters in some header positions, but escaping
//! them is valid everywhere.
//!
//! Lines are folded before they would exceed the frame's maximum length,
//! preferring positions just before whitespace.

use crate::frame::{FOLD_LENGTH, Frame, FrameConfig};
use crate::hex;

/// Encoding of a CRLF pair.
const ENCODED_CRLF: &[u8; 6] = b"=0D=0A";

/// Encodes `chunk` into `frame` and returns the number of input bytes
/// consumed.
///
/// The frame's header is appended first if the frame is empty, and the
/// footer after the last consumed byte. All of `chunk` is consumed unless
/// the frame reaches its flush threshold at a fold; the caller then
/// flushes and resets the frame and encodes the remainder. The count may
/// be zero when the frame was already full on entry, but a freshly reset
/// frame always accepts at least one byte.
pub fn encode(frame: &mut Frame, chunk: &[u8]) -> usize {
    if chunk.is_empty() {
        return 0;
    }
    frame.open_word();

    let mut cur = 0;
    while cur < chunk.len() {
        let byte = chunk[cur];
        let crlf = byte == b'\r' && chunk.get(cur + 1) == Some(&b'\n');
        let width = if crlf { ENCODED_CRLF.len() } else { encoded_width(byte) };

        if needs_fold(frame, byte, width) {
            if frame.is_full() {
                tracing::debug!(
                    buffered = frame.len(),
                    consumed = cur,
                    "Frame full, splitting at fold"
                );
                frame.suspend_at_fold();
                return cur;
            }
            frame.append_fold();
        }

        if crlf {
            frame.append(ENCODED_CRLF);
            cur += 2;
            continue;
        }

        match byte {
            b' ' => frame.append(b"_"),
            b if b.is_ascii_alphanumeric() => frame.append(&[b]),
            b => frame.append(&hex::escape(b)),
        }
        cur += 1;
    }

    frame.append_footer();
    cur
}

/// Encodes a complete header value in memory.
///
/// The result holds one encoded-word per output line, lines separated by
/// a CRLF and a continuation space.
#[must_use]
pub fn encode_to_vec(input: &[u8], config: FrameConfig) -> Vec<u8> {
    let mut frame = Frame::new(config);
    let mut output = Vec::new();
    let mut written = 0;

    loop {
        written += encode(&mut frame, &input[written..]);
        if written < input.len() {
            output.extend_from_slice(frame.as_bytes());
            frame.reset();
        } else {
            break;
        }
    }

    output.extend_from_slice(frame.as_bytes());
    output
}

const fn encoded_width(byte: u8) -> usize {
    if byte == b' ' || byte.is_ascii_alphanumeric() {
        1
    } else {
        3
    }
}

const fn is_fold_point(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

/// Decides whether to fold before encoding `byte`.
///
/// Folds early before whitespace once a fold would no longer fit, and
/// always when the encoded byte plus the footer would overrun the line.
fn needs_fold(frame: &Frame, byte: u8, width: usize) -> bool {
    let used = frame.line_length() + frame.footer_length();
    let max = frame.max_line_length();
    (is_fold_point(byte) && used + FOLD_LENGTH >= max) || used + width > max
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

    fn encode_plain(input: &[u8]) -> String {
        String::from_utf8(encode_to_vec(input, FrameConfig::new())).unwrap()
    }

    fn short_lines(max_line_length: usize) -> FrameConfig {
        FrameConfig::builder()
            .max_line_length(max_line_length)
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_space() {
        assert_eq!(encode_plain(b" "), "_");
    }

    #[test]
    fn test_encode_crlf() {
        assert_eq!(encode_plain(b"\r\n"), "=0D=0A");
    }

    #[test]
    fn test_encode_lone_cr_and_lf() {
        assert_eq!(encode_plain(b"\r"), "=0D");
        assert_eq!(encode_plain(b"\n"), "=0A");
        assert_eq!(encode_plain(b"\n\r"), "=0A=0D");
    }

    #[test]
    fn test_encode_alphanumeric_unchanged() {
        assert_eq!(encode_plain(b"Hello2026"), "Hello2026");
    }

    #[test]
    fn test_encode_escapes() {
        assert_eq!(encode_plain(&[0x7F]), "=7F");
        assert_eq!(encode_plain(b"a=b_c?"), "a=3Db=5Fc=3F");
        assert_eq!(encode_plain("café".as_bytes()), "caf=C3=A9");
    }

    #[test]
    fn test_encode_empty_input() {
        let mut frame = Frame::new(FrameConfig::encoded_word("utf-8").unwrap());
        assert_eq!(encode(&mut frame, b""), 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_encode_with_markers() {
        let config = FrameConfig::encoded_word("utf-8").unwrap();
        let encoded = encode_to_vec("Grüße aus Köln".as_bytes(), config);
        assert_eq!(
            encoded,
            b"=?utf-8?Q?Gr=C3=BC=C3=9Fe_aus_K=C3=B6ln?=".as_slice()
        );
    }

    #[test]
    fn test_encode_reports_full_consumption() {
        let mut frame = Frame::new(FrameConfig::new());
        let input = vec![b'a'; 500];
        assert_eq!(encode(&mut frame, &input), 500);
    }

    #[test]
    fn test_consecutive_encodes_share_word() {
        let mut frame = Frame::new(FrameConfig::encoded_word("utf-8").unwrap());
        encode(&mut frame, b"Hello");
        encode(&mut frame, b" World");
        assert_eq!(frame.as_str(), Some("=?utf-8?Q?Hello_World?="));
    }

    #[test]
    fn test_header_reappended_after_reset() {
        let mut frame = Frame::new(FrameConfig::encoded_word("utf-8").unwrap());
        encode(&mut frame, b"one");
        frame.reset();
        encode(&mut frame, b"two");
        assert_eq!(frame.as_str(), Some("=?utf-8?Q?two?="));
    }

    #[test]
    fn test_fold_at_line_limit() {
        let encoded = encode_to_vec(b"abcdefghijkl", short_lines(10));
        assert_eq!(encoded, b"abcdefghij\r\n kl".as_slice());
    }

    #[test]
    fn test_fold_before_whitespace() {
        let encoded = encode_to_vec(b"abcdefg hij", short_lines(10));
        assert_eq!(encoded, b"abcdefg\r\n _hij".as_slice());
    }

    #[test]
    fn test_fold_keeps_escape_whole() {
        // "abcdefgh" fills 8 of 10; "=C3" would overrun.
        let encoded = encode_to_vec("abcdefghé".as_bytes(), short_lines(10));
        assert_eq!(encoded, b"abcdefgh\r\n =C3=A9".as_slice());
    }

    #[test]
    fn test_fold_with_markers_closes_each_word() {
        let config = FrameConfig::builder()
            .header("=?utf-8?Q?")
            .footer("?=")
            .max_line_length(20)
            .build()
            .unwrap();
        let encoded = encode_to_vec(b"abcdefghijkl", config);
        // 10 header + 8 payload + 2 footer = 20
        assert_eq!(
            encoded,
            b"=?utf-8?Q?abcdefgh?=\r\n =?utf-8?Q?ijkl?=".as_slice()
        );
    }

    #[test]
    fn test_lines_within_limit() {
        let config = FrameConfig::encoded_word("utf-8").unwrap();
        let input = "Ünïcödé subject line with plenty of words \r\n and escapes ".repeat(8);
        let encoded = encode_to_vec(input.as_bytes(), config);
        for line in encoded.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
    }

    #[test]
    fn test_flush_threshold_splits_at_fold() {
        let config = FrameConfig::builder()
            .max_line_length(10)
            .flush_threshold(10)
            .build()
            .unwrap();
        let input = vec![b'a'; 25];
        let mut frame = Frame::new(config);

        assert_eq!(encode(&mut frame, &input), 10);
        assert_eq!(frame.as_bytes(), b"aaaaaaaaaa");
        frame.reset();

        assert_eq!(encode(&mut frame, &input[10..]), 9);
        assert_eq!(frame.as_bytes(), b"\r\n aaaaaaaaa");
        frame.reset();

        assert_eq!(encode(&mut frame, &input[19..]), 6);
        assert_eq!(frame.as_bytes(), b"\r\n aaaaaa");
    }

    #[test]
    fn test_full_frame_splits_before_first_byte() {
        let config = FrameConfig::builder()
            .max_line_length(10)
            .flush_threshold(10)
            .build()
            .unwrap();
        let mut frame = Frame::new(config);

        assert_eq!(encode(&mut frame, b"aaaaaaaaaa"), 10);
        assert_eq!(encode(&mut frame, b"b"), 0);
        assert!(frame.fold_pending());
        assert_eq!(frame.as_bytes(), b"aaaaaaaaaa");

        frame.reset();
        assert_eq!(encode(&mut frame, b"b"), 1);
        assert_eq!(frame.as_bytes(), b"\r\n b");
    }

    #[test]
    fn test_flush_threshold_does_not_change_output() {
        let input = "Ärger über Öl ".repeat(40);
        let small = FrameConfig::builder()
            .header("=?utf-8?Q?")
            .footer("?=")
            .flush_threshold(1)
            .build()
            .unwrap();
        let large = FrameConfig::encoded_word("utf-8").unwrap();
        assert_eq!(
            encode_to_vec(input.as_bytes(), small),
            encode_to_vec(input.as_bytes(), large)
        );
    }
}
