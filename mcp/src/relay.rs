//! Stdio to socket relay
//!
//! Bridges a process speaking line-delimited stdio to a remote server
//! speaking WebSocket. A client engine in the middle performs the
//! initialize handshake; after that every inbound socket message is echoed
//! to stdout and every stdin line is forwarded to the socket verbatim.

use crate::client::Client;
use crate::error::{McpError, Result};
use crate::transport::WebSocketTransport;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Default port of the remote server
pub const DEFAULT_PORT: u16 = 7337;

/// Remote endpoint of the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Remote host
    pub host: String,

    /// Remote port
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl RelayConfig {
    /// WebSocket URL of the remote endpoint
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Stdio↔socket relay
///
/// Stdin is not consumed until the socket connection is established and
/// the initialize handshake has completed; a handshake failure propagates
/// out of [`Relay::connect`] as a fatal startup error.
pub struct Relay {
    client: Arc<Client>,
}

impl Relay {
    /// Connect to the remote server and complete the handshake
    pub async fn connect(config: &RelayConfig) -> Result<Self> {
        let url = config.url();
        info!(url = url.as_str(), "connecting to remote server");

        let transport = WebSocketTransport::connect(&url).await?;
        let client = Arc::new(Client::new(Arc::new(transport)));
        client.start().await?;

        client
            .initialize(
                json!({}),
                json!({
                    "name": "gangway-relay",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )
            .await?;
        info!("session established");

        // Handshake frames were correlated above; everything from here on
        // is forwarded downstream verbatim, in arrival order
        client.on_raw_message(|text| println!("{}", text)).await;

        Ok(Self { client })
    }

    /// Pump stdin lines to the socket until interrupted
    ///
    /// Returns on interrupt signal, stdin EOF, or peer disconnect; a
    /// forwarding failure for a single line is logged and the loop
    /// continues.
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let outcome = loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("interrupt received");
                    break Ok(());
                }
                _ = self.client.closed() => {
                    warn!("connection closed by peer");
                    break Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Err(e) = self.client.send_raw(&line).await {
                            warn!(error = %e, "failed to forward line");
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break Ok(());
                    }
                    Err(e) => {
                        error!(error = %e, "stdin read failed");
                        break Err(McpError::Io(e));
                    }
                }
            }
        };

        self.close().await;
        outcome
    }

    /// Tear down the client engine and the socket transport
    ///
    /// Idempotent; safe to call after `run` returned.
    pub async fn close(&self) {
        if let Err(e) = self.client.close().await {
            warn!(error = %e, "error during shutdown");
        }
    }
}
