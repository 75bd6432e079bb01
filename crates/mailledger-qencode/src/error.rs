//! Error types for Q-encoding operations.

use std::io;

/// Result type alias for Q-encoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Q-encoding error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An escape sequence contained a byte that is not a hex digit.
    #[error("Invalid hex digit 0x{byte:02X} in escape sequence")]
    InvalidHexDigit {
        /// The offending byte.
        byte: u8,
    },

    /// Input ended in the middle of an escape sequence.
    #[error("Escape sequence truncated at end of input")]
    TruncatedEscape,

    /// Buffer range outside the supplied buffer.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Frame configuration that cannot produce bounded lines.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from the underlying sink or source.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if this is a malformed-input error raised while decoding.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::InvalidHexDigit { .. } | Self::TruncatedEscape)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::TruncatedEscape => Self::new(io::ErrorKind::UnexpectedEof, err),
            Error::InvalidArgument(_) | Error::InvalidConfig(_) => {
                Self::new(io::ErrorKind::InvalidInput, err)
            }
            Error::InvalidHexDigit { .. } => Self::new(io::ErrorKind::InvalidData, err),
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

    #[test]
    fn test_error_display() {
        let err = Error::InvalidHexDigit { byte: b'G' };
        assert_eq!(err.to_string(), "Invalid hex digit 0x47 in escape sequence");
        assert!(err.is_format_error());
        assert!(!Error::InvalidArgument("offset".into()).is_format_error());
    }

    #[test]
    fn test_io_error_passes_through() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let io_err = io::Error::from(err);
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(io_err.to_string(), "gone");
    }

    #[test]
    fn test_io_error_kinds() {
        let kind = |e: Error| io::Error::from(e).kind();
        assert_eq!(
            kind(Error::InvalidHexDigit { byte: 0 }),
            io::ErrorKind::InvalidData
        );
        assert_eq!(kind(Error::TruncatedEscape), io::ErrorKind::UnexpectedEof);
        assert_eq!(
            kind(Error::InvalidArgument("count".into())),
            io::ErrorKind::InvalidInput
        );
    }
}
