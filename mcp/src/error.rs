//! Error types for the protocol engine

use crate::protocol::JsonRpcError;
use serde_json::Value;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, McpError>;

/// Protocol engine errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Protocol error (invalid JSON-RPC)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Missing or malformed parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Tool name absent from the route table
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Resource URI absent from the route table
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Prompt name absent from the route table
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Prompt declared in the catalog but no template registered for it
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    /// Tool or prompt argument rejected by the handler
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The peer answered with an error object
    #[error("Remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code
        code: i32,
        /// Error message
        message: String,
        /// Additional error data
        data: Option<Value>,
    },

    /// Send or receive on a transport that was already closed
    #[error("Transport closed")]
    TransportClosed,

    /// The underlying channel rejected an operation
    #[error("Transport I/O error: {0}")]
    TransportIo(String),

    /// The client engine was closed while requests were pending
    #[error("Client closed")]
    ClientClosed,

    /// Operation invoked in a state that forbids it
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to a JSON-RPC error object
    ///
    /// Protocol-level faults map to the standard code table; domain faults
    /// (unknown tool/resource/prompt, bad arguments) all map to -32000.
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            McpError::Protocol(msg) => JsonRpcError::invalid_request(msg),
            McpError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            McpError::InvalidParams(msg) => JsonRpcError::internal_error(msg),
            McpError::ToolNotFound(tool) => JsonRpcError::tool_not_found(tool),
            McpError::ResourceNotFound(uri) => JsonRpcError::resource_not_found(uri),
            McpError::PromptNotFound(prompt) => JsonRpcError::prompt_not_found(prompt),
            McpError::UnknownPrompt(prompt) => {
                JsonRpcError::invalid_arguments(format!("Unknown prompt: {}", prompt))
            }
            McpError::InvalidArguments(msg) => JsonRpcError::invalid_arguments(msg),
            McpError::Remote {
                code,
                message,
                data,
            } => match data {
                Some(data) => JsonRpcError::with_data(*code, message.clone(), data.clone()),
                None => JsonRpcError::new(*code, message.clone()),
            },
            McpError::Json(e) => JsonRpcError::internal_error(e.to_string()),
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }

    /// True for faults that terminate the owning engine
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::TransportClosed | McpError::TransportIo(_) | McpError::ClientClosed
        )
    }
}

impl From<JsonRpcError> for McpError {
    fn from(error: JsonRpcError) -> Self {
        McpError::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_band_mapping() {
        assert_eq!(
            McpError::MethodNotFound("nope".to_string()).to_jsonrpc().code,
            -32601
        );
        assert_eq!(
            McpError::InvalidParams("missing 'name'".to_string())
                .to_jsonrpc()
                .code,
            -32603
        );
        assert_eq!(
            McpError::Protocol("bad version".to_string()).to_jsonrpc().code,
            -32600
        );
    }

    #[test]
    fn test_domain_band_mapping() {
        assert_eq!(
            McpError::ToolNotFound("calc".to_string()).to_jsonrpc().code,
            -32000
        );
        assert_eq!(
            McpError::ResourceNotFound("file://x".to_string())
                .to_jsonrpc()
                .code,
            -32000
        );
        assert_eq!(
            McpError::PromptNotFound("greet".to_string()).to_jsonrpc().code,
            -32000
        );
        assert_eq!(
            McpError::InvalidArguments("missing required argument: name".to_string())
                .to_jsonrpc()
                .code,
            -32000
        );
    }

    #[test]
    fn test_remote_error_roundtrip() {
        let wire = JsonRpcError::tool_not_found("calculate");
        let err = McpError::from(wire);
        match &err {
            McpError::Remote { code, message, .. } => {
                assert_eq!(*code, -32000);
                assert!(message.contains("calculate"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert_eq!(err.to_jsonrpc().code, -32000);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(McpError::TransportClosed.is_fatal());
        assert!(McpError::TransportIo("broken pipe".to_string()).is_fatal());
        assert!(!McpError::MethodNotFound("x".to_string()).is_fatal());
    }
}
