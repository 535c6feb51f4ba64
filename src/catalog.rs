//! Demonstration catalogs served by `gangway serve`
//!
//! Sample tools, resources, and prompts handed to the server engine as its
//! route table. The engine treats these opaquely; swapping them out does
//! not touch the protocol machinery.

use async_trait::async_trait;
use mcp::{
    McpError, PromptArgument, PromptDefinition, PromptMessage, ResourceDefinition, Result,
    RouteTable, Tool, ToolDefinition, RESOURCE_CATALOG_URI, SYSTEM_INFO_URI,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Basic arithmetic over two operands
struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculate".to_string(),
            description: "Perform basic arithmetic on two numbers.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "description": "Operation to perform",
                        "enum": ["add", "subtract", "multiply", "divide"]
                    },
                    "a": {
                        "type": "number",
                        "description": "First operand"
                    },
                    "b": {
                        "type": "number",
                        "description": "Second operand"
                    }
                },
                "required": ["operation", "a", "b"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let operation = arguments["operation"]
            .as_str()
            .ok_or_else(|| McpError::InvalidArguments("Missing 'operation' argument".to_string()))?;
        let a = arguments["a"]
            .as_f64()
            .ok_or_else(|| McpError::InvalidArguments("Missing 'a' argument".to_string()))?;
        let b = arguments["b"]
            .as_f64()
            .ok_or_else(|| McpError::InvalidArguments("Missing 'b' argument".to_string()))?;

        let value = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(McpError::InvalidArguments("Division by zero".to_string()));
                }
                a / b
            }
            other => {
                return Err(McpError::InvalidArguments(format!(
                    "Unknown operation: {}",
                    other
                )));
            }
        };

        Ok(json!({
            "content": [{"type": "text", "text": value.to_string()}]
        }))
    }
}

/// Echoes a message back to the caller
struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echo a message back unchanged.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Message to echo"
                    }
                },
                "required": ["message"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| McpError::InvalidArguments("Missing 'message' argument".to_string()))?;

        Ok(json!({
            "content": [{"type": "text", "text": message}]
        }))
    }
}

/// Build the demonstration route table
pub fn routes() -> RouteTable {
    let mut routes = RouteTable::new();

    routes.add_tool(Arc::new(CalculateTool));
    routes.add_tool(Arc::new(EchoTool));

    routes.add_resource(ResourceDefinition {
        uri: SYSTEM_INFO_URI.to_string(),
        name: "System information".to_string(),
        description: Some("Environment and platform details of the server process".to_string()),
        mime_type: Some("application/json".to_string()),
    });
    routes.add_resource(ResourceDefinition {
        uri: RESOURCE_CATALOG_URI.to_string(),
        name: "Resource catalog".to_string(),
        description: Some("The resource catalog itself, serialized".to_string()),
        mime_type: Some("application/json".to_string()),
    });

    routes.add_prompt(
        PromptDefinition {
            name: "greeting".to_string(),
            description: "Greet someone by name".to_string(),
            arguments: vec![PromptArgument {
                name: "name".to_string(),
                description: Some("Who to greet".to_string()),
                required: true,
            }],
        },
        |args| {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("friend");
            vec![PromptMessage::text(
                "user",
                format!("Please write a short, warm greeting for {}.", name),
            )]
        },
    );

    routes.add_prompt(
        PromptDefinition {
            name: "review".to_string(),
            description: "Ask for a review of a piece of code".to_string(),
            arguments: vec![
                PromptArgument {
                    name: "code".to_string(),
                    description: Some("Code to review".to_string()),
                    required: true,
                },
                PromptArgument {
                    name: "focus".to_string(),
                    description: Some("Aspect to focus on".to_string()),
                    required: false,
                },
            ],
        },
        |args| {
            let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
            let focus = args
                .get("focus")
                .and_then(Value::as_str)
                .unwrap_or("correctness");
            vec![PromptMessage::text(
                "user",
                format!("Review the following code with a focus on {}:\n\n{}", focus, code),
            )]
        },
    );

    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calculate_operations() {
        let tool = CalculateTool;

        let cases = [
            ("add", 2.0, 3.0, "5"),
            ("subtract", 5.0, 3.0, "2"),
            ("multiply", 4.0, 2.5, "10"),
            ("divide", 9.0, 3.0, "3"),
        ];
        for (operation, a, b, expected) in cases {
            let result = tool
                .execute(json!({"operation": operation, "a": a, "b": b}))
                .await
                .unwrap();
            assert_eq!(result["content"][0]["text"], *expected);
        }
    }

    #[tokio::test]
    async fn test_calculate_division_by_zero() {
        let tool = CalculateTool;
        let result = tool
            .execute(json!({"operation": "divide", "a": 1, "b": 0}))
            .await;
        assert!(matches!(result, Err(McpError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_calculate_unknown_operation() {
        let tool = CalculateTool;
        let result = tool
            .execute(json!({"operation": "modulo", "a": 1, "b": 2}))
            .await;
        assert!(matches!(result, Err(McpError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_echo_roundtrips_message() {
        let tool = EchoTool;
        let result = tool.execute(json!({"message": "hello"})).await.unwrap();
        assert_eq!(result["content"][0]["text"], "hello");
    }

    #[test]
    fn test_routes_are_fully_populated() {
        let routes = routes();
        assert_eq!(routes.tool_definitions().len(), 2);
        assert_eq!(routes.resources().len(), 2);
        assert_eq!(routes.prompt_definitions().len(), 2);
        assert!(routes.tool("calculate").is_some());
        assert!(routes.prompt("review").is_some());
    }
}
