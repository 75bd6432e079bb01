//! Incremental Q-encoding decoder.
//!
//! Decoding never grows the data, so each chunk is decoded in place: the
//! write cursor trails the read cursor through the same buffer. An escape
//! sequence (`=XX`) or soft line break (`=\r\n`) that is cut off by the end
//! of a chunk is remembered in a [`DecodeCarry`] and completed by the next
//! call.

use crate::error::{Error, Result};
use crate::hex;

/// Escape state carried between decode calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeCarry {
    /// No escape in progress.
    #[default]
    Clean,
    /// The previous chunk ended with `=`.
    PendingFirstByte,
    /// The previous chunk ended with `=` and one more byte.
    PendingSecondByte(u8),
}

/// Decodes `chunk` in place, continuing from `carry`.
///
/// Returns the number of decoded bytes now at the front of `chunk` and the
/// carry to pass to the next call. A chunk that ends inside an escape is
/// not an error; the partial escape moves into the returned carry.
///
/// # Errors
///
/// Returns [`Error::InvalidHexDigit`] if an escape sequence is neither a
/// soft line break nor two hex digits. No further bytes are decoded and
/// the caller's carry remains the one passed in.
pub fn decode(chunk: &mut [u8], carry: DecodeCarry) -> Result<(usize, DecodeCarry)> {
    let end = chunk.len();
    let mut src = 0;
    let mut dst = 0;

    match carry {
        DecodeCarry::Clean => {}
        DecodeCarry::PendingFirstByte => match *chunk {
            [] => return Ok((0, DecodeCarry::PendingFirstByte)),
            [second] => return Ok((0, DecodeCarry::PendingSecondByte(second))),
            [first, second, ..] => {
                if let Some(byte) = escape_value(first, second)? {
                    chunk[dst] = byte;
                    dst += 1;
                }
                src = 2;
            }
        },
        DecodeCarry::PendingSecondByte(first) => {
            let Some(&second) = chunk.first() else {
                return Ok((0, carry));
            };
            if let Some(byte) = escape_value(first, second)? {
                chunk[dst] = byte;
                dst += 1;
            }
            src = 1;
        }
    }

    while src < end {
        match chunk[src] {
            b'=' => match end - src {
                1 => return Ok((dst, DecodeCarry::PendingFirstByte)),
                2 => return Ok((dst, DecodeCarry::PendingSecondByte(chunk[src + 1]))),
                _ => {
                    if let Some(byte) = escape_value(chunk[src + 1], chunk[src + 2])? {
                        chunk[dst] = byte;
                        dst += 1;
                    }
                    src += 3;
                }
            },
            b'_' => {
                chunk[dst] = b' ';
                dst += 1;
                src += 1;
            }
            byte => {
                chunk[dst] = byte;
                dst += 1;
                src += 1;
            }
        }
    }

    Ok((dst, DecodeCarry::Clean))
}

/// Resolves the two bytes following `=`.
///
/// Returns `None` for a soft line break.
fn escape_value(first: u8, second: u8) -> Result<Option<u8>> {
    if first == b'\r' && second == b'\n' {
        return Ok(None);
    }
    let high = hex::decode_nibble(first).ok_or(Error::InvalidHexDigit { byte: first })?;
    let low = hex::decode_nibble(second).ok_or(Error::InvalidHexDigit { byte: second })?;
    Ok(Some((high << 4) | low))
}

/// Stateful decoder holding the carry across chunks.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    carry: DecodeCarry,
}

impl Decoder {
    /// Creates a decoder with no escape in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the next chunk in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHexDigit`] on a malformed escape. The carry is
    /// left as it was before the call.
    pub fn decode(&mut self, chunk: &mut [u8]) -> Result<usize> {
        let (len, carry) = decode(chunk, self.carry)?;
        self.carry = carry;
        Ok(len)
    }

    /// Returns the current carry.
    #[must_use]
    pub const fn carry(&self) -> DecodeCarry {
        self.carry
    }

    /// Returns true if no escape is in progress.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self.carry, DecodeCarry::Clean)
    }

    /// Checks that the input ended on an escape boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedEscape`] if an escape is still pending.
    pub fn finish(self) -> Result<()> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(Error::TruncatedEscape)
        }
    }
}

/// Decodes a complete Q-encoded payload.
///
/// Header and footer markers are not recognised; pass only the text
/// between them.
///
/// # Errors
///
/// Returns an error if an escape is malformed or the input ends inside one.
pub fn decode_to_vec(input: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = input.to_vec();
    let mut decoder = Decoder::new();
    let len = decoder.decode(&mut buffer)?;
    decoder.finish()?;
    buffer.truncate(len);
    Ok(buffer)
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

    /// Feeds `parts` one call at a time and collects the output.
    fn decode_parts<T: AsRef<[u8]>>(parts: &[T]) -> Result<Vec<u8>> {
        let mut decoder = Decoder::new();
        let mut out = Vec::new();
        for part in parts {
            let mut chunk = part.as_ref().to_vec();
            let len = decoder.decode(&mut chunk)?;
            out.extend_from_slice(&chunk[..len]);
        }
        decoder.finish()?;
        Ok(out)
    }

    #[test]
    fn test_decode_literal_escapes() {
        assert_eq!(decode_to_vec(b"=3D").unwrap(), vec![0x3D]);
        assert_eq!(decode_to_vec(b"=0D=0A").unwrap(), vec![0x0D, 0x0A]);
        assert_eq!(decode_to_vec(b"_").unwrap(), vec![0x20]);
    }

    #[test]
    fn test_decode_passthrough_and_underscore() {
        assert_eq!(decode_to_vec(b"Hello_World").unwrap(), b"Hello World");
        assert_eq!(decode_to_vec(b"").unwrap(), b"");
    }

    #[test]
    fn test_decode_lowercase_hex() {
        assert_eq!(decode_to_vec(b"caf=c3=a9").unwrap(), "café".as_bytes());
    }

    #[test]
    fn test_decode_in_place_returns_length() {
        let mut chunk = *b"a=41_b";
        let (len, carry) = decode(&mut chunk, DecodeCarry::Clean).unwrap();
        assert_eq!(len, 4);
        assert_eq!(&chunk[..len], b"aA b");
        assert_eq!(carry, DecodeCarry::Clean);
    }

    #[test]
    fn test_decode_carry_across_calls() {
        let mut first = *b"=3";
        let (len, carry) = decode(&mut first, DecodeCarry::Clean).unwrap();
        assert_eq!(len, 0);
        assert_eq!(carry, DecodeCarry::PendingSecondByte(b'3'));

        let mut second = *b"D";
        let (len, carry) = decode(&mut second, carry).unwrap();
        assert_eq!(len, 1);
        assert_eq!(second[0], 0x3D);
        assert_eq!(carry, DecodeCarry::Clean);
    }

    #[test]
    fn test_decode_single_equals_chunk() {
        let mut chunk = *b"=";
        let (len, carry) = decode(&mut chunk, DecodeCarry::Clean).unwrap();
        assert_eq!(len, 0);
        assert_eq!(carry, DecodeCarry::PendingFirstByte);
    }

    #[test]
    fn test_decode_trailing_escape_keeps_prefix() {
        let mut chunk = *b"ab=4";
        let (len, carry) = decode(&mut chunk, DecodeCarry::Clean).unwrap();
        assert_eq!(&chunk[..len], b"ab");
        assert_eq!(carry, DecodeCarry::PendingSecondByte(b'4'));
    }

    #[test]
    fn test_decode_pending_first_byte_promotion() {
        let mut empty: [u8; 0] = [];
        let (len, carry) = decode(&mut empty, DecodeCarry::PendingFirstByte).unwrap();
        assert_eq!((len, carry), (0, DecodeCarry::PendingFirstByte));

        let mut one = *b"4";
        let (len, carry) = decode(&mut one, DecodeCarry::PendingFirstByte).unwrap();
        assert_eq!((len, carry), (0, DecodeCarry::PendingSecondByte(b'4')));

        let mut rest = *b"1bc";
        let (len, carry) = decode(&mut rest, carry).unwrap();
        assert_eq!(&rest[..len], b"Abc");
        assert_eq!(carry, DecodeCarry::Clean);
    }

    #[test]
    fn test_decode_pending_first_byte_with_two_bytes() {
        let mut chunk = *b"41z";
        let (len, carry) = decode(&mut chunk, DecodeCarry::PendingFirstByte).unwrap();
        assert_eq!(&chunk[..len], b"Az");
        assert_eq!(carry, DecodeCarry::Clean);
    }

    #[test]
    fn test_decode_pending_second_byte_empty_chunk() {
        let mut empty: [u8; 0] = [];
        let carry = DecodeCarry::PendingSecondByte(b'\r');
        assert_eq!(decode(&mut empty, carry).unwrap(), (0, carry));
    }

    #[test]
    fn test_soft_break_every_split() {
        let input = b"ab=\r\ncd";
        for split in 0..=input.len() {
            let (head, tail) = input.split_at(split);
            assert_eq!(decode_parts(&[head, tail]).unwrap(), b"abcd", "split {split}");
        }
        let bytes: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(decode_parts(&bytes[..]).unwrap(), b"abcd");
    }

    #[test]
    fn test_soft_break_alone() {
        assert_eq!(decode_to_vec(b"=\r\n").unwrap(), b"");
        assert_eq!(decode_parts(&["=", "\r", "\n"]).unwrap(), b"");
        assert_eq!(decode_parts(&["=\r", "\n"]).unwrap(), b"");
        assert_eq!(decode_parts(&["=", "\r\n"]).unwrap(), b"");
    }

    #[test]
    fn test_decode_invalid_escape() {
        let err = decode_to_vec(b"=G1").unwrap_err();
        assert!(matches!(err, Error::InvalidHexDigit { byte: b'G' }));

        let err = decode_to_vec(b"=1G").unwrap_err();
        assert!(matches!(err, Error::InvalidHexDigit { byte: b'G' }));
    }

    #[test]
    fn test_decode_invalid_escape_across_calls() {
        let err = decode_parts(&["=1", "G"]).unwrap_err();
        assert!(matches!(err, Error::InvalidHexDigit { byte: b'G' }));

        let err = decode_parts(&["=", "Z1"]).unwrap_err();
        assert!(matches!(err, Error::InvalidHexDigit { byte: b'Z' }));
    }

    #[test]
    fn test_lone_carriage_return_is_not_soft_break() {
        let err = decode_to_vec(b"=\rX").unwrap_err();
        assert!(matches!(err, Error::InvalidHexDigit { byte: b'\r' }));
    }

    #[test]
    fn test_decoder_error_keeps_carry() {
        let mut decoder = Decoder::new();
        let mut chunk = *b"=4";
        decoder.decode(&mut chunk).unwrap();
        let mut bad = *b"x";
        assert!(decoder.decode(&mut bad).is_err());
        assert_eq!(decoder.carry(), DecodeCarry::PendingSecondByte(b'4'));
    }

    #[test]
    fn test_decode_to_vec_truncated() {
        assert!(matches!(
            decode_to_vec(b"abc=").unwrap_err(),
            Error::TruncatedEscape
        ));
        assert!(matches!(
            decode_to_vec(b"abc=4").unwrap_err(),
            Error::TruncatedEscape
        ));
    }
}
