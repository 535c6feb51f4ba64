//! Transport abstraction for JSON-RPC messages
//!
//! A transport is an ordered, reliable, message-oriented duplex channel
//! carrying UTF-8 text frames. Engines own exactly one transport each and
//! close it exactly once during teardown; message semantics live entirely
//! in the engines.

pub mod stdio;
pub mod websocket;

use crate::error::Result;
use async_trait::async_trait;

pub use stdio::StdioTransport;
pub use websocket::WebSocketTransport;

/// An ordered, reliable duplex channel of text messages
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueue one outbound message
    ///
    /// Fails with `TransportClosed` after `close`, or `TransportIo` when the
    /// underlying channel rejects the write. A successful send does not mean
    /// the peer has received the message.
    async fn send(&self, message: &str) -> Result<()>;

    /// Wait for the next inbound message
    ///
    /// Returns `Ok(None)` once the peer disconnects or the transport is
    /// closed; an `Err` is terminal and no further messages will be
    /// produced. The sequence is unbounded and non-restartable.
    async fn receive(&self) -> Result<Option<String>>;

    /// Release the underlying channel
    ///
    /// Idempotent; the first call terminates the inbound sequence,
    /// subsequent calls are no-ops.
    async fn close(&self) -> Result<()>;
}
