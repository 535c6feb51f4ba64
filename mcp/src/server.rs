//! Server engine
//!
//! Classifies inbound frames into request/notification/response, routes
//! requests through the method table, and tracks resource subscriptions.
//! Protocol faults are answered with the standard JSON-RPC codes and the
//! listener keeps going; only transport faults end the session.

use crate::error::{McpError, Result};
use crate::protocol::{
    notifications, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ServerMethod,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::transport::Transport;
use crate::types::{
    PromptDefinition, PromptMessage, PromptTemplate, ResourceDefinition, Tool, ToolDefinition,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// URI answered with computed environment/platform metadata
pub const SYSTEM_INFO_URI: &str = "system://info";

/// URI answered with the resource catalog serialized to a string
pub const RESOURCE_CATALOG_URI: &str = "catalog://resources";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported during `initialize`
    pub name: String,

    /// Server version
    pub version: String,

    /// Usage instructions reported during `initialize`
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gangway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// The three catalogs requests are routed against
///
/// Tools execute, resources are read by URI, prompts render through a
/// name-keyed template registry. The engine treats all entries opaquely.
#[derive(Default)]
pub struct RouteTable {
    tools: Vec<Arc<dyn Tool>>,
    resources: Vec<ResourceDefinition>,
    prompts: Vec<PromptDefinition>,
    templates: HashMap<String, PromptTemplate>,
}

impl RouteTable {
    /// Create an empty route table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Register resource metadata
    pub fn add_resource(&mut self, resource: ResourceDefinition) {
        self.resources.push(resource);
    }

    /// Register a prompt and the template that renders it
    pub fn add_prompt<F>(&mut self, prompt: PromptDefinition, template: F)
    where
        F: Fn(&Map<String, Value>) -> Vec<PromptMessage> + Send + Sync + 'static,
    {
        self.templates
            .insert(prompt.name.clone(), Box::new(template));
        self.prompts.push(prompt);
    }

    /// Look up a tool by exact name
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// Catalog entries for `tools/list`
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Catalog entries for `resources/list`
    pub fn resources(&self) -> &[ResourceDefinition] {
        &self.resources
    }

    /// Look up a prompt by exact name
    pub fn prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.iter().find(|p| p.name == name)
    }

    /// Catalog entries for `prompts/list`
    pub fn prompt_definitions(&self) -> &[PromptDefinition] {
        &self.prompts
    }

    fn template(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Created,
    Started,
    Stopped,
}

/// MCP server engine
///
/// Owns its transport and a route table supplied by the host. `start`
/// subscribes to the inbound sequence; `stop` cancels it and closes the
/// transport.
pub struct Server {
    inner: Arc<ServerInner>,
    state: Mutex<ServerState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct ServerInner {
    transport: Arc<dyn Transport>,
    config: ServerConfig,
    routes: RouteTable,
    subscriptions: Mutex<HashMap<String, HashSet<RequestId>>>,
    initialized: AtomicBool,
}

impl Server {
    /// Create a new server over an established transport
    pub fn new(transport: Arc<dyn Transport>, config: ServerConfig, routes: RouteTable) -> Self {
        info!(
            server = config.name.as_str(),
            version = config.version.as_str(),
            tools = routes.tools.len(),
            resources = routes.resources.len(),
            prompts = routes.prompts.len(),
            "server created"
        );

        Self {
            inner: Arc::new(ServerInner {
                transport,
                config,
                routes,
                subscriptions: Mutex::new(HashMap::new()),
                initialized: AtomicBool::new(false),
            }),
            state: Mutex::new(ServerState::Created),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to the transport's inbound sequence
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != ServerState::Created {
            return Err(McpError::IllegalState(format!(
                "server cannot start from {:?} state",
                *state
            )));
        }
        *state = ServerState::Started;

        let inner = Arc::clone(&self.inner);
        *self.listener.lock().await = Some(tokio::spawn(async move {
            inner.listen().await;
        }));

        Ok(())
    }

    /// Stop the engine and close the transport
    ///
    /// Idempotent; safe to call from any state.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == ServerState::Stopped {
            return Ok(());
        }
        *state = ServerState::Stopped;

        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }
        self.inner.transport.close().await
    }

    /// Wait for the inbound loop to finish (peer disconnect or stop)
    pub async fn join(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
    }

    /// Whether the peer has completed the initialize handshake
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Announce a content change for a resource
    ///
    /// Emits one `notifications/resources/updated` notification per current
    /// subscriber entry for the URI. Triggered by the host, not by any
    /// client request.
    pub async fn notify_resource_updated(&self, uri: &str) {
        self.inner.notify_resource_updated(uri).await;
    }
}

impl ServerInner {
    async fn listen(&self) {
        info!("server listening");
        loop {
            match self.transport.receive().await {
                Ok(Some(text)) => {
                    if let Some(response) = self.handle_frame(&text).await {
                        match serde_json::to_string(&response) {
                            Ok(text) => {
                                if let Err(e) = self.transport.send(&text).await {
                                    warn!(error = %e, "failed to send response");
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to serialize response"),
                        }
                    }
                }
                Ok(None) => {
                    info!("client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "transport failed");
                    break;
                }
            }
        }
    }

    /// Classify and process one frame; `None` means nothing goes back
    async fn handle_frame(&self, text: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to parse frame");
                return Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()));
            }
        };

        let id = parse_id(&value);

        match value.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("expected jsonrpc \"2.0\""),
                ));
            }
        }

        let params = value.get("params").cloned();
        let method = match value.get("method").and_then(Value::as_str) {
            Some(method) => method.to_string(),
            None => {
                if value.get("result").is_some() || value.get("error").is_some() {
                    // This engine never issues requests, so a response frame
                    // has nothing to correlate against
                    debug!("dropping response frame");
                    return None;
                }
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("missing method"),
                ));
            }
        };

        let id = match id {
            Some(id) => id,
            None => {
                self.handle_notification(&method).await;
                return None;
            }
        };

        debug!(id = %id, method = %method, "handling request");
        let outcome = match ServerMethod::parse(&method) {
            Some(method) => self.dispatch(method, &id, params).await,
            None => Err(McpError::MethodNotFound(method)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                warn!(error = %e, "request failed");
                JsonRpcResponse::error(Some(id), e.to_jsonrpc())
            }
        })
    }

    async fn handle_notification(&self, method: &str) {
        match method {
            notifications::INITIALIZED => {
                info!("client initialized");
                self.initialized.store(true, Ordering::SeqCst);
            }
            other => debug!(method = other, "ignoring notification"),
        }
    }

    async fn dispatch(
        &self,
        method: ServerMethod,
        id: &RequestId,
        params: Option<Value>,
    ) -> Result<Value> {
        match method {
            ServerMethod::Initialize => self.handle_initialize(params),
            ServerMethod::Ping => Ok(json!({})),
            ServerMethod::ToolsList => Ok(json!({"tools": self.routes.tool_definitions()})),
            ServerMethod::ToolsCall => self.handle_tools_call(params).await,
            ServerMethod::ResourcesList => Ok(json!({"resources": self.routes.resources()})),
            ServerMethod::ResourcesRead => self.handle_resources_read(params),
            ServerMethod::ResourcesSubscribe => self.handle_subscription(id, params, true).await,
            ServerMethod::ResourcesUnsubscribe => self.handle_subscription(id, params, false).await,
            ServerMethod::PromptsList => Ok(json!({"prompts": self.routes.prompt_definitions()})),
            ServerMethod::PromptsGet => self.handle_prompts_get(params),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        info!(?params, "received initialize request");

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.config.name,
                "version": self.config.version,
            },
            "capabilities": {
                "tools": {},
                "resources": {"subscribe": true},
                "prompts": {},
            },
            "instructions": self.config.instructions,
        }))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value> {
        let params = params
            .ok_or_else(|| McpError::InvalidParams("Missing parameters".to_string()))?;
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".to_string()))?;
        let arguments = match params.get("arguments") {
            Some(arguments) => arguments.clone(),
            None => json!({}),
        };

        info!(tool = name, "calling tool");
        let tool = self
            .routes
            .tool(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        tool.execute(arguments).await
    }

    fn handle_resources_read(&self, params: Option<Value>) -> Result<Value> {
        let params = params
            .ok_or_else(|| McpError::InvalidParams("Missing parameters".to_string()))?;
        let uri = params["uri"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'uri' parameter".to_string()))?;

        let text = match uri {
            SYSTEM_INFO_URI => serde_json::to_string(&json!({
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "pid": std::process::id(),
                "server": {
                    "name": self.config.name,
                    "version": self.config.version,
                },
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }))?,
            RESOURCE_CATALOG_URI => serde_json::to_string(self.routes.resources())?,
            other => return Err(McpError::ResourceNotFound(other.to_string())),
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": text,
            }]
        }))
    }

    async fn handle_subscription(
        &self,
        id: &RequestId,
        params: Option<Value>,
        subscribe: bool,
    ) -> Result<Value> {
        let params = params
            .ok_or_else(|| McpError::InvalidParams("Missing parameters".to_string()))?;
        let uri = params["uri"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'uri' parameter".to_string()))?;

        {
            let mut subscriptions = self.subscriptions.lock().await;
            if subscribe {
                subscriptions
                    .entry(uri.to_string())
                    .or_default()
                    .insert(id.clone());
            } else if let Some(subscribers) = subscriptions.get_mut(uri) {
                // Unknown subscribers are a no-op, not an error
                subscribers.remove(id);
                if subscribers.is_empty() {
                    subscriptions.remove(uri);
                }
            }
        }

        let action = if subscribe { "subscribed" } else { "unsubscribed" };
        info!(uri = uri, subscriber = %id, action = action, "subscription changed");
        self.send_log(format!("{} {} for {}", action, id, uri)).await;

        Ok(json!({}))
    }

    /// Emit an informational `notifications/message`; never fails the caller
    async fn send_log(&self, data: String) {
        let notification = JsonRpcRequest::notification(
            notifications::MESSAGE,
            Some(json!({"level": "info", "data": data})),
        );
        match serde_json::to_string(&notification) {
            Ok(text) => {
                if let Err(e) = self.transport.send(&text).await {
                    warn!(error = %e, "failed to send log notification");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize log notification"),
        }
    }

    fn handle_prompts_get(&self, params: Option<Value>) -> Result<Value> {
        let params = params
            .ok_or_else(|| McpError::InvalidParams("Missing parameters".to_string()))?;
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".to_string()))?;
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let prompt = self
            .routes
            .prompt(name)
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))?;

        for argument in &prompt.arguments {
            if argument.required && !arguments.contains_key(&argument.name) {
                return Err(McpError::InvalidArguments(format!(
                    "Missing required argument: {}",
                    argument.name
                )));
            }
        }

        let template = self
            .routes
            .template(name)
            .ok_or_else(|| McpError::UnknownPrompt(name.to_string()))?;
        let messages = template(&arguments);

        Ok(json!({
            "description": prompt.description,
            "messages": messages,
        }))
    }

    async fn notify_resource_updated(&self, uri: &str) {
        let subscriber_count = self
            .subscriptions
            .lock()
            .await
            .get(uri)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0);

        debug!(uri = uri, subscribers = subscriber_count, "resource updated");
        let notification = JsonRpcRequest::notification(
            notifications::RESOURCES_UPDATED,
            Some(json!({"uri": uri})),
        );
        let text = match serde_json::to_string(&notification) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize update notification");
                return;
            }
        };

        // One send per subscriber entry, even though the transport is a
        // single peer
        for _ in 0..subscriber_count {
            if let Err(e) = self.transport.send(&text).await {
                warn!(error = %e, "failed to send update notification");
                return;
            }
        }
    }
}

fn parse_id(value: &Value) -> Option<RequestId> {
    match value.get("id") {
        Some(Value::Number(n)) => n.as_i64().map(RequestId::Number),
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}
