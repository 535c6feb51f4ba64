//! # Gangway MCP engine
//!
//! Bidirectional JSON-RPC 2.0 message protocol (the Model Context Protocol
//! wire format) over pluggable transports, plus a relay that bridges
//! line-delimited stdio to a WebSocket peer.
//!
//! ## Architecture
//!
//! - **Protocol Layer**: JSON-RPC 2.0 message model and the closed method
//!   table
//! - **Transport Layer**: stdio and WebSocket bindings behind one trait
//! - **Client Engine**: request/response correlation and notification
//!   dispatch
//! - **Server Engine**: frame classification, request routing, and
//!   subscription bookkeeping
//! - **Relay**: stdio↔socket bridge with handshake-first startup
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gangway_mcp::{Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::connect(&RelayConfig::default()).await?;
//!     relay.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::Client;
pub use error::{McpError, Result};
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ServerMethod, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
pub use relay::{Relay, RelayConfig, DEFAULT_PORT};
pub use server::{RouteTable, Server, ServerConfig, RESOURCE_CATALOG_URI, SYSTEM_INFO_URI};
pub use transport::{StdioTransport, Transport, WebSocketTransport};
pub use types::{
    Implementation, PromptArgument, PromptContent, PromptDefinition, PromptMessage, PromptTemplate,
    ResourceDefinition, Tool, ToolDefinition,
};
