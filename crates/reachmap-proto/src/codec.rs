//! Newline-delimited JSON codec over child-process stdio.

use crate::{TaskPayload, WorkerMessage};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

/// Codec errors.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Underlying stream error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Write the task payload as a single JSON line and flush.
pub async fn write_payload<W>(writer: &mut W, payload: &TaskPayload) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(payload)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Reads worker messages off a line-oriented stream.
///
/// Blank lines are skipped; unparseable lines are logged with a preview and
/// skipped rather than failing the stream, so a worker that prints stray
/// output cannot take down its task.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    /// Wrap a raw byte stream (typically a child's stdout).
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            line: String::new(),
        }
    }

    /// Next parsed message, or `None` at end of stream.
    pub async fn next(&mut self) -> Result<Option<WorkerMessage>, ProtoError> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_line(&mut self.line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<WorkerMessage>(trimmed) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    let preview: String = trimmed.chars().take(200).collect();
                    warn!(error = %e, preview = %preview, "Failed to parse worker message");
                }
            }
        }
    }
}
