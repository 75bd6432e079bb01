//! Hex digit lookup tables.
//!
//! Decoding accepts both upper- and lowercase digits. Encoding always
//! produces uppercase, as RFC 2047 requires.

/// Maps every byte to its nibble value, or `None` if it is not a hex digit.
static HEX_DECODE: [Option<u8>; 256] = {
    let mut table = [None; 256];
    let mut i = 0u8;
    while i < 10 {
        table[(b'0' + i) as usize] = Some(i);
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        table[(b'A' + i) as usize] = Some(10 + i);
        table[(b'a' + i) as usize] = Some(10 + i);
        i += 1;
    }
    table
};

/// Uppercase hex digits indexed by nibble.
static HEX_ENCODE: [u8; 16] = *b"0123456789ABCDEF";

/// Returns the nibble value of a hex digit.
#[must_use]
pub fn decode_nibble(byte: u8) -> Option<u8> {
    HEX_DECODE[usize::from(byte)]
}

/// Encodes a byte as an `=XX` escape.
#[must_use]
pub fn escape(byte: u8) -> [u8; 3] {
    [
        b'=',
        HEX_ENCODE[usize::from(byte >> 4)],
        HEX_ENCODE[usize::from(byte & 0x0F)],
    ]
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
    fn test_decode_nibble_digits() {
        for (i, byte) in (b'0'..=b'9').enumerate() {
            assert_eq!(decode_nibble(byte), Some(u8::try_from(i).unwrap()));
        }
    }

    #[test]
    fn test_decode_nibble_both_cases() {
        assert_eq!(decode_nibble(b'A'), Some(10));
        assert_eq!(decode_nibble(b'a'), Some(10));
        assert_eq!(decode_nibble(b'F'), Some(15));
        assert_eq!(decode_nibble(b'f'), Some(15));
    }

    #[test]
    fn test_decode_nibble_rejects_non_hex() {
        let valid = (0u8..=255).filter(|b| decode_nibble(*b).is_some()).count();
        assert_eq!(valid, 22);
        assert_eq!(decode_nibble(b'G'), None);
        assert_eq!(decode_nibble(b'g'), None);
        assert_eq!(decode_nibble(b'='), None);
        assert_eq!(decode_nibble(b'\r'), None);
        assert_eq!(decode_nibble(0xFF), None);
    }

    #[test]
    fn test_escape_uppercase() {
        assert_eq!(&escape(0x7F), b"=7F");
        assert_eq!(&escape(0x00), b"=00");
        assert_eq!(&escape(0xAB), b"=AB");
        assert_eq!(&escape(b'='), b"=3D");
        assert_eq!(&escape(b'_'), b"=5F");
    }
}
