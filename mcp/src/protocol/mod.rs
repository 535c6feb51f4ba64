//! Wire protocol types
//!
//! JSON-RPC 2.0 message model and the closed set of methods the server
//! engine recognizes.

pub mod jsonrpc;
pub mod methods;

pub use jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, JSONRPC_VERSION, PROTOCOL_VERSION,
};
pub use methods::{notifications, ServerMethod};
