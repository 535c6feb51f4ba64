//! Catalog types shared between the server engine and its host
//!
//! The server engine treats tools, resources, and prompts opaquely: the
//! host hands it these shapes and the engine routes requests to them.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool definition as listed by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// An invocable tool
///
/// `execute` receives the caller-supplied argument mapping (an empty object
/// when the caller sent none) and its result is returned verbatim as the
/// response result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Catalog entry for this tool
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with the supplied arguments
    async fn execute(&self, arguments: Value) -> Result<Value>;
}

/// Resource metadata as listed by `resources/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource URI, the lookup key for reads and subscriptions
    pub uri: String,

    /// Human-readable name
    pub name: String,

    /// Resource description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the content
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A single argument a prompt accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,

    /// Argument description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the caller must supply this argument
    #[serde(default)]
    pub required: bool,
}

/// Prompt definition as listed by `prompts/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Prompt name
    pub name: String,

    /// Prompt description
    pub description: String,

    /// Declared arguments
    pub arguments: Vec<PromptArgument>,
}

/// A message synthesized by a prompt template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role ("user" or "assistant")
    pub role: String,

    /// Message content
    pub content: PromptContent,
}

/// Text content of a prompt message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContent {
    /// Content type (always "text")
    #[serde(rename = "type")]
    pub content_type: String,

    /// The content itself
    pub text: String,
}

impl PromptMessage {
    /// Create a text message for the given role
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: PromptContent {
                content_type: "text".to_string(),
                text: text.into(),
            },
        }
    }
}

/// Renders a prompt's messages from validated arguments
pub type PromptTemplate = Box<dyn Fn(&Map<String, Value>) -> Vec<PromptMessage> + Send + Sync>;

/// Client or server identification exchanged during `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,

    /// Implementation version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_wire_format() {
        let def = ToolDefinition {
            name: "calculate".to_string(),
            description: "Basic arithmetic".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        };

        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"inputSchema\""));
        assert!(!json.contains("input_schema"));
    }

    #[test]
    fn test_resource_definition_optional_fields() {
        let def = ResourceDefinition {
            uri: "system://info".to_string(),
            name: "System info".to_string(),
            description: None,
            mime_type: Some("application/json".to_string()),
        };

        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"mimeType\""));
        assert!(!json.contains("description"));
    }

    #[test]
    fn test_prompt_argument_required_defaults_false() {
        let arg: PromptArgument = serde_json::from_str(r#"{"name": "style"}"#).unwrap();
        assert!(!arg.required);
    }

    #[test]
    fn test_prompt_message_text() {
        let msg = PromptMessage::text("user", "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"role\":\"user\""));
    }
}
