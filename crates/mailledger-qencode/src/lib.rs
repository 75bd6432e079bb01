//! # mailledger-qencode
//!
//! Streaming RFC 2047 "Q" encoding for email header fields.
//!
//! ## Features
//!
//! - **Streaming encode**: Writes are Q-encoded and folded into lines no
//!   longer than the configured maximum, each line a complete encoded-word
//! - **In-place decode**: Reads are decoded in the caller's buffer, with
//!   escapes and soft line breaks that span reads carried over
//! - **Blocking and async**: `std::io::{Read, Write}` and tokio
//!   `AsyncRead`/`AsyncWrite` sinks and sources
//!
//! ## Quick Start
//!
//! ### Encoding a Subject
//!
//! ```ignore
//! use mailledger_qencode::{FrameConfig, encode_to_vec};
//!
//! let config = FrameConfig::encoded_word("utf-8")?;
//! let encoded = encode_to_vec("Grüße aus Köln".as_bytes(), config);
//! assert_eq!(encoded, b"=?utf-8?Q?Gr=C3=BC=C3=9Fe_aus_K=C3=B6ln?=");
//! ```
//!
//! ### Streaming to a Sink
//!
//! ```ignore
//! use mailledger_qencode::{FrameConfig, QEncodedStream};
//!
//! let config = FrameConfig::encoded_word("utf-8")?;
//! let mut stream = QEncodedStream::with_config(socket, config);
//! stream.write_async(subject.as_bytes()).await?;
//! stream.flush_async().await?;
//! ```
//!
//! ### Decoding
//!
//! ```ignore
//! use mailledger_qencode::Decoder;
//!
//! let mut decoder = Decoder::new();
//! let mut chunk = *b"caf=C3=A9_au_lait";
//! let len = decoder.decode(&mut chunk)?;
//! assert_eq!(&chunk[..len], "café au lait".as_bytes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;

pub mod decode;
pub mod encode;
pub mod frame;
pub mod hex;
pub mod stream;

pub use decode::{DecodeCarry, Decoder, decode_to_vec};
pub use encode::encode_to_vec;
pub use error::{Error, Result};
pub use frame::{Frame, FrameConfig, FrameConfigBuilder};
pub use stream::QEncodedStream;
