//! Example: Encode a subject line as RFC 2047 Q encoded-words
//!
//! Encodes the given text, writes the folded header to stdout, then decodes
//! it again to show the round trip.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailledger_qencode=trace \
//!     cargo run --package mailledger-qencode --example encode_subject -- "Grüße aus Köln"
//! ```

use anyhow::Context as _;
use mailledger_qencode::{FrameConfig, QEncodedStream, decode_to_vec};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailledger_qencode=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let subject = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let subject = if subject.is_empty() {
        "Réunion: café & croissants à 10h30".to_string()
    } else {
        subject
    };

    let config = FrameConfig::encoded_word("utf-8")?;
    let header = config.header().to_vec();
    let footer = config.footer().to_vec();

    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Subject: ").await?;

    let mut stream = QEncodedStream::with_config(Vec::new(), config);
    stream.write_async(subject.as_bytes()).await?;
    stream.flush_async().await?;
    let encoded = stream.into_inner();

    stdout.write_all(&encoded).await?;
    stdout.write_all(b"\r\n").await?;
    stdout.flush().await?;

    // Strip folds and markers, then decode the payload.
    let mut payload = Vec::new();
    for line in encoded.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = line.strip_prefix(b" ").unwrap_or(line);
        let inner = line
            .strip_prefix(header.as_slice())
            .and_then(|l| l.strip_suffix(footer.as_slice()))
            .context("line is not a complete encoded-word")?;
        payload.extend_from_slice(inner);
    }
    let decoded = String::from_utf8(decode_to_vec(&payload)?)?;
    println!("Decoded: {decoded}");

    Ok(())
}
