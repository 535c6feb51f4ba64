//! Recognized method names
//!
//! Server-bound methods form a closed enumeration; anything outside it is
//! answered with a method-not-found error. Notification names live in a
//! separate namespace and never receive a response.

/// Methods the server engine routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMethod {
    /// Protocol handshake
    Initialize,
    /// Liveness check, empty result
    Ping,
    /// List the tool catalog
    ToolsList,
    /// Invoke a tool by name
    ToolsCall,
    /// List the resource catalog
    ResourcesList,
    /// Read resource content by URI
    ResourcesRead,
    /// Subscribe to change notifications for a URI
    ResourcesSubscribe,
    /// Drop a subscription for a URI
    ResourcesUnsubscribe,
    /// List the prompt catalog
    PromptsList,
    /// Render a prompt by name
    PromptsGet,
}

impl ServerMethod {
    /// Resolve a wire method name; `None` means method-not-found
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(ServerMethod::Initialize),
            "ping" => Some(ServerMethod::Ping),
            "tools/list" => Some(ServerMethod::ToolsList),
            "tools/call" => Some(ServerMethod::ToolsCall),
            "resources/list" => Some(ServerMethod::ResourcesList),
            "resources/read" => Some(ServerMethod::ResourcesRead),
            "resources/subscribe" => Some(ServerMethod::ResourcesSubscribe),
            "resources/unsubscribe" => Some(ServerMethod::ResourcesUnsubscribe),
            "prompts/list" => Some(ServerMethod::PromptsList),
            "prompts/get" => Some(ServerMethod::PromptsGet),
            _ => None,
        }
    }

    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMethod::Initialize => "initialize",
            ServerMethod::Ping => "ping",
            ServerMethod::ToolsList => "tools/list",
            ServerMethod::ToolsCall => "tools/call",
            ServerMethod::ResourcesList => "resources/list",
            ServerMethod::ResourcesRead => "resources/read",
            ServerMethod::ResourcesSubscribe => "resources/subscribe",
            ServerMethod::ResourcesUnsubscribe => "resources/unsubscribe",
            ServerMethod::PromptsList => "prompts/list",
            ServerMethod::PromptsGet => "prompts/get",
        }
    }
}

/// Notification method names
pub mod notifications {
    /// Sent by the client once the initialize handshake completes
    pub const INITIALIZED: &str = "notifications/initialized";

    /// Informational log message (params: level, data)
    pub const MESSAGE: &str = "notifications/message";

    /// Content changed for a subscribed resource (params: uri)
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_methods() {
        let methods = [
            ServerMethod::Initialize,
            ServerMethod::Ping,
            ServerMethod::ToolsList,
            ServerMethod::ToolsCall,
            ServerMethod::ResourcesList,
            ServerMethod::ResourcesRead,
            ServerMethod::ResourcesSubscribe,
            ServerMethod::ResourcesUnsubscribe,
            ServerMethod::PromptsList,
            ServerMethod::PromptsGet,
        ];

        for method in methods {
            assert_eq!(ServerMethod::parse(method.as_str()), Some(method));
        }
    }

    #[test]
    fn test_parse_unknown_method() {
        assert_eq!(ServerMethod::parse("tools/delete"), None);
        assert_eq!(ServerMethod::parse(""), None);
        assert_eq!(ServerMethod::parse("notifications/initialized"), None);
    }
}
