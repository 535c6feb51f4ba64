//! Stdio transport for JSON-RPC messages
//!
//! Line-delimited text over process stdin/stdout. Each message is a single
//! line terminated by a newline; blank lines are skipped. Diagnostics go to
//! stderr so the message channel stays clean.

use super::Transport;
use crate::error::{McpError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

/// Stdio transport
///
/// Reads inbound messages from stdin and writes outbound messages to
/// stdout, one line each.
pub struct StdioTransport {
    stdin: Mutex<BufReader<io::Stdin>>,
    stdout: Mutex<io::Stdout>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Create a new stdio transport over the process streams
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(io::stdin())),
            stdout: Mutex::new(io::stdout()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::TransportClosed);
        }

        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(message.as_bytes())
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))?;
        stdout
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))?;

        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut stdin = self.stdin.lock().await;
        loop {
            let mut line = String::new();
            let n = stdin
                .read_line(&mut line)
                .await
                .map_err(|e| McpError::TransportIo(e.to_string()))?;
            if n == 0 {
                // EOF
                debug!("stdin closed");
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(Some(trimmed.to_string()));
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut stdout = self.stdout.lock().await;
        stdout.flush().await.ok();
        Ok(())
    }
}
