//! `Content-Length` framing for JSON-RPC over stdio.
//!
//! LSP frames are `Content-Length: N\r\n\r\n{json}`. [`FrameReader`] and
//! [`FrameWriter`] handle the framing; message semantics live in
//! [`protocol`](crate::protocol).

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size to keep a misbehaving server from allocating
/// unbounded memory.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error while {context}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("frame of {size} bytes exceeds the {MAX_FRAME_BYTES} byte cap")]
    FrameTooLarge { size: usize },
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value: {value:?}")]
    InvalidContentLength { value: String },
    #[error("unexpected EOF while reading headers")]
    TruncatedHeader,
    #[error("invalid JSON in frame body")]
    Json(#[from] serde_json::Error),
}

fn io_err(context: &'static str) -> impl FnOnce(std::io::Error) -> TransportError {
    move |source| TransportError::Io { context, source }
}

/// Reads framed JSON-RPC messages from an async reader.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next frame. `Ok(None)` means clean EOF between frames;
    /// EOF in the middle of headers or a body is an error.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>, TransportError> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                size: content_length,
            });
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(io_err("reading frame body"))?;

        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>, TransportError> {
        let mut content_length = None;
        let mut line = String::new();
        let mut mid_headers = false;

        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(io_err("reading header line"))?;

            if read == 0 {
                // EOF before any header bytes is a clean shutdown; EOF
                // after a partial header block is not.
                if mid_headers {
                    return Err(TransportError::TruncatedHeader);
                }
                return Ok(None);
            }
            mid_headers = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            // The LSP spec writes "Content-Length"; accept any case and
            // ignore unknown headers such as Content-Type.
            if let Some((key, value)) = trimmed.split_once(':')
                && key.trim().eq_ignore_ascii_case("Content-Length")
            {
                let value = value.trim();
                let parsed =
                    value
                        .parse::<usize>()
                        .map_err(|_| TransportError::InvalidContentLength {
                            value: value.to_string(),
                        })?;
                content_length = Some(parsed);
            }
        }

        content_length
            .map(Some)
            .ok_or(TransportError::MissingContentLength)
    }
}

/// Writes framed JSON-RPC messages to an async writer.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<(), TransportError> {
        let body = serde_json::to_string(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .map_err(io_err("writing frame header"))?;
        self.writer
            .write_all(body.as_bytes())
            .await
            .map_err(io_err("writing frame body"))?;
        self.writer
            .flush()
            .await
            .map_err(io_err("flushing frame"))?;

        Ok(())
    }
}
