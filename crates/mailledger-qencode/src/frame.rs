//! Frame buffer for encoded output.
//!
//! A frame accumulates one or more encoded-words between flushes to the
//! sink. It tracks how long the current output line is so the encoder can
//! fold before the configured maximum is reached.

use bytes::BytesMut;

use crate::error::{Error, Result};

/// Default maximum line length (RFC 2047 Section 2).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 76;

/// Default number of buffered bytes after which the frame is flushed at
/// the next fold.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 8192;

/// Bytes added by a fold: CRLF plus one continuation space.
pub const FOLD_LENGTH: usize = 3;

/// Widest encoding of a single input unit (`=0D=0A` for CRLF).
const MAX_ENCODED_WIDTH: usize = 6;

/// Frame configuration.
///
/// Construct with [`FrameConfig::builder`] or
/// [`FrameConfig::encoded_word`]; both validate that a continuation line
/// always has room for at least one encoded byte.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "FrameConfigBuilder")
)]
pub struct FrameConfig {
    header: String,
    footer: String,
    max_line_length: usize,
    flush_threshold: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            header: String::new(),
            footer: String::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl FrameConfig {
    /// Creates a configuration without markers and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> FrameConfigBuilder {
        FrameConfigBuilder::new()
    }

    /// Creates a configuration with `=?charset?Q?` / `?=` markers.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset is empty or contains `?`,
    /// whitespace, or non-ASCII characters.
    pub fn encoded_word(charset: &str) -> Result<Self> {
        let valid = !charset.is_empty()
            && charset
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b'?');
        if !valid {
            return Err(Error::InvalidConfig(format!("invalid charset: {charset:?}")));
        }
        Self::builder()
            .header(format!("=?{charset}?Q?"))
            .footer("?=")
            .build()
    }

    /// Returns the opening marker.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        self.header.as_bytes()
    }

    /// Returns the closing marker.
    #[must_use]
    pub fn footer(&self) -> &[u8] {
        self.footer.as_bytes()
    }

    /// Returns the maximum line length, footer included.
    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Returns the flush threshold in bytes.
    #[must_use]
    pub const fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }
}

/// Builder for frame configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct FrameConfigBuilder {
    header: String,
    footer: String,
    max_line_length: usize,
    flush_threshold: usize,
}

impl Default for FrameConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConfigBuilder {
    /// Creates a builder with no markers and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: String::new(),
            footer: String::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    /// Sets the opening marker.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Sets the closing marker.
    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Sets the flush threshold.
    #[must_use]
    pub const fn flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a continuation line (space, header, one encoded
    /// unit, footer) would not fit in the maximum line length, or if the
    /// flush threshold is zero.
    pub fn build(self) -> Result<FrameConfig> {
        let minimum = 1 + self.header.len() + MAX_ENCODED_WIDTH + self.footer.len();
        if self.max_line_length < minimum {
            return Err(Error::InvalidConfig(format!(
                "max line length {} is below the minimum of {minimum} for these markers",
                self.max_line_length
            )));
        }
        if self.flush_threshold == 0 {
            return Err(Error::InvalidConfig(
                "flush threshold must be non-zero".to_string(),
            ));
        }
        Ok(FrameConfig {
            header: self.header,
            footer: self.footer,
            max_line_length: self.max_line_length,
            flush_threshold: self.flush_threshold,
        })
    }
}

impl TryFrom<FrameConfigBuilder> for FrameConfig {
    type Error = Error;

    fn try_from(builder: FrameConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Accumulating buffer of encoded output.
#[derive(Debug)]
pub struct Frame {
    config: FrameConfig,
    buffer: BytesMut,
    line_length: usize,
    fold_pending: bool,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            buffer: BytesMut::new(),
            line_length: 0,
            fold_pending: false,
        }
    }

    /// Returns the frame configuration.
    #[must_use]
    pub const fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Returns the buffered bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the buffered bytes as text.
    ///
    /// Encoded output is ASCII; this is `None` only when a marker is not.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.buffer).ok()
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the length of the current output line.
    #[must_use]
    pub const fn line_length(&self) -> usize {
        self.line_length
    }

    /// Returns the configured maximum line length.
    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.config.max_line_length
    }

    /// Returns the length of the closing marker.
    #[must_use]
    pub fn footer_length(&self) -> usize {
        self.config.footer.len()
    }

    /// Returns true once the flush threshold is reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.config.flush_threshold
    }

    /// Returns true if the next word must start on a continuation line.
    #[must_use]
    pub const fn fold_pending(&self) -> bool {
        self.fold_pending
    }

    /// Appends encoded bytes to the current line.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.line_length += bytes.len();
    }

    /// Appends the opening marker.
    pub fn append_header(&mut self) {
        let header = self.config.header.as_bytes();
        self.buffer.extend_from_slice(header);
        self.line_length += header.len();
    }

    /// Appends the closing marker.
    pub fn append_footer(&mut self) {
        let footer = self.config.footer.as_bytes();
        self.buffer.extend_from_slice(footer);
        self.line_length += footer.len();
    }

    /// Closes the current word and starts a new one on a continuation line.
    pub fn append_fold(&mut self) {
        self.append_footer();
        self.append_continuation();
        self.append_header();
    }

    fn append_continuation(&mut self) {
        self.buffer.extend_from_slice(b"\r\n ");
        self.line_length = 1;
    }

    /// Opens a word for the next encode call.
    ///
    /// An empty frame gets the header, preceded by the continuation of a
    /// fold that was split across a flush. A frame still holding a closed
    /// word has its footer removed so encoding continues that word, unless
    /// that word was suspended at a fold which was never flushed.
    pub fn open_word(&mut self) {
        if self.buffer.is_empty() {
            if std::mem::take(&mut self.fold_pending) {
                self.append_continuation();
            }
            self.append_header();
        } else if std::mem::take(&mut self.fold_pending) {
            self.append_continuation();
            self.append_header();
        } else {
            let footer_length = self.footer_length();
            if self.buffer.ends_with(self.config.footer.as_bytes()) {
                self.buffer.truncate(self.buffer.len() - footer_length);
                self.line_length = self.line_length.saturating_sub(footer_length);
            }
        }
    }

    /// Closes the word at a fold point and defers the continuation line
    /// until after the next flush.
    pub fn suspend_at_fold(&mut self) {
        self.append_footer();
        self.fold_pending = true;
    }

    /// Empties the frame after its contents reached the sink.
    ///
    /// A fold deferred by [`Frame::suspend_at_fold`] survives the reset.
    /// Otherwise line tracking restarts at zero, as if the sink line were
    /// empty.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.line_length = 0;
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

    fn utf8_frame() -> Frame {
        Frame::new(FrameConfig::encoded_word("utf-8").unwrap())
    }

    #[test]
    fn test_config_defaults() {
        let config = FrameConfig::new();
        assert_eq!(config.max_line_length(), 76);
        assert_eq!(config.flush_threshold(), DEFAULT_FLUSH_THRESHOLD);
        assert!(config.header().is_empty());
        assert!(config.footer().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = FrameConfig::builder()
            .header("=?iso-8859-1?Q?")
            .footer("?=")
            .max_line_length(40)
            .flush_threshold(128)
            .build()
            .unwrap();

        assert_eq!(config.header(), b"=?iso-8859-1?Q?");
        assert_eq!(config.footer(), b"?=");
        assert_eq!(config.max_line_length(), 40);
        assert_eq!(config.flush_threshold(), 128);
    }

    #[test]
    fn test_config_rejects_short_lines() {
        // 1 + 10 + 6 + 2 = 19
        let result = FrameConfig::builder()
            .header("=?utf-8?Q?")
            .footer("?=")
            .max_line_length(18)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = FrameConfig::builder()
            .header("=?utf-8?Q?")
            .footer("?=")
            .max_line_length(19)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_rejects_zero_threshold() {
        let result = FrameConfig::builder().flush_threshold(0).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_encoded_word_markers() {
        let config = FrameConfig::encoded_word("utf-8").unwrap();
        assert_eq!(config.header(), b"=?utf-8?Q?");
        assert_eq!(config.footer(), b"?=");
    }

    #[test]
    fn test_encoded_word_rejects_bad_charset() {
        assert!(FrameConfig::encoded_word("").is_err());
        assert!(FrameConfig::encoded_word("utf?8").is_err());
        assert!(FrameConfig::encoded_word("utf 8").is_err());
        assert!(FrameConfig::encoded_word("ütf-8").is_err());
    }

    #[test]
    fn test_frame_tracks_line_length() {
        let mut frame = utf8_frame();
        frame.open_word();
        assert_eq!(frame.line_length(), 10);
        frame.append(b"abc");
        assert_eq!(frame.line_length(), 13);
        frame.append_fold();
        assert_eq!(frame.as_bytes(), b"=?utf-8?Q?abc?=\r\n =?utf-8?Q?");
        assert_eq!(frame.line_length(), 11);
    }

    #[test]
    fn test_open_word_continues_closed_word() {
        let mut frame = utf8_frame();
        frame.open_word();
        frame.append(b"ab");
        frame.append_footer();
        assert_eq!(frame.line_length(), 14);

        frame.open_word();
        frame.append(b"cd");
        frame.append_footer();
        assert_eq!(frame.as_str(), Some("=?utf-8?Q?abcd?="));
        assert_eq!(frame.line_length(), 16);
    }

    #[test]
    fn test_reset_reopens_with_header() {
        let mut frame = utf8_frame();
        frame.open_word();
        frame.append(b"x");
        frame.append_footer();
        frame.reset();
        assert!(frame.is_empty());
        assert_eq!(frame.line_length(), 0);

        frame.open_word();
        assert_eq!(frame.as_bytes(), b"=?utf-8?Q?");
    }

    #[test]
    fn test_suspended_fold_survives_reset() {
        let mut frame = utf8_frame();
        frame.open_word();
        frame.append(b"x");
        frame.suspend_at_fold();
        assert!(frame.fold_pending());
        assert_eq!(frame.as_bytes(), b"=?utf-8?Q?x?=");

        frame.reset();
        assert!(frame.fold_pending());
        frame.open_word();
        assert!(!frame.fold_pending());
        assert_eq!(frame.as_bytes(), b"\r\n =?utf-8?Q?");
        assert_eq!(frame.line_length(), 11);
    }

    #[test]
    fn test_is_full() {
        let config = FrameConfig::builder().flush_threshold(4).build().unwrap();
        let mut frame = Frame::new(config);
        frame.append(b"abc");
        assert!(!frame.is_full());
        frame.append(b"d");
        assert!(frame.is_full());
    }
}
