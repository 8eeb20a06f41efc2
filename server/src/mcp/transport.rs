//! MCP Transport Layer
//!
//! Newline-delimited JSON-RPC 2.0 over any async byte stream; stdio in
//! production, in-memory buffers in tests.

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// One inbound message
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// A line that is not a JSON-RPC request
    Malformed(String),
    /// The peer closed the stream
    Closed,
}

/// Line-framed transport
pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

impl Transport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Transport over the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next request, skipping blank lines
    pub async fn read(&mut self) -> io::Result<Incoming> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(Incoming::Closed);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Ok(match serde_json::from_str(line) {
                Ok(request) => Incoming::Request(request),
                Err(e) => {
                    tracing::warn!("Failed to parse JSON-RPC request: {}", e);
                    Incoming::Malformed(e.to_string())
                }
            });
        }
    }

    /// Write one response followed by a newline
    pub async fn write(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Give back the writer (tests read what was sent)
    pub fn into_writer(self) -> W {
        self.writer
    }
}
