//! WebSocket transport for JSON-RPC messages
//!
//! Binds the transport contract to a persistent WebSocket connection. Text
//! frames carry one message each; Close frames and stream end terminate the
//! inbound sequence the same way a local close does.

use super::Transport;
use crate::error::{McpError, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// WebSocket transport over an established connection
///
/// Construct with [`WebSocketTransport::connect`] on the dialing side or
/// [`WebSocketTransport::accept`] on the listening side.
pub struct WebSocketTransport<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    source: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: AtomicBool,
}

impl WebSocketTransport<MaybeTlsStream<TcpStream>> {
    /// Dial a remote WebSocket endpoint (e.g. `ws://localhost:7337`)
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))?;
        debug!(url = url, "websocket connected");
        Ok(Self::from_stream(stream))
    }
}

impl WebSocketTransport<TcpStream> {
    /// Complete the server-side handshake on an accepted TCP connection
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))?;
        Ok(Self::from_stream(ws))
    }
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn from_stream(stream: WebSocketStream<S>) -> Self {
        let (sink, source) = stream.split();
        Self {
            sink: Mutex::new(sink),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, message: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::TransportClosed);
        }

        self.sink
            .lock()
            .await
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| McpError::TransportIo(e.to_string()))
    }

    async fn receive(&self) -> Result<Option<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut source = self.source.lock().await;
        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => {
                    // Peer-initiated disconnect cleans up like a local close
                    debug!("websocket closed by peer");
                    self.closed.store(true, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(McpError::TransportIo(e.to_string()));
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(None)).await.ok();
        sink.close().await.ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn transport_pair() -> (
        WebSocketTransport<MaybeTlsStream<TcpStream>>,
        WebSocketTransport<TcpStream>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            WebSocketTransport::accept(stream).await.unwrap()
        });

        let client = WebSocketTransport::connect(&format!("ws://{}", addr))
            .await
            .unwrap();
        let server = accept.await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_messages_roundtrip_in_order() {
        let (client, server) = transport_pair().await;

        client.send("one").await.unwrap();
        client.send("two").await.unwrap();

        assert_eq!(server.receive().await.unwrap(), Some("one".to_string()));
        assert_eq!(server.receive().await.unwrap(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client, _server) = transport_pair().await;

        client.close().await.unwrap();
        let result = client.send("late").await;
        assert!(matches!(result, Err(McpError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_peer_close_terminates_incoming() {
        let (client, server) = transport_pair().await;

        client.close().await.unwrap();
        assert_eq!(server.receive().await.unwrap(), None);

        // Terminated sequence stays terminated
        assert_eq!(server.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _server) = transport_pair().await;
        client.close().await.unwrap();
        client.close().await.unwrap();
    }
}
