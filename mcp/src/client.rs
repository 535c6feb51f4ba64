//! Client engine
//!
//! Issues requests over a transport, correlates each with its eventual
//! response by identifier, and dispatches unsolicited notifications to
//! registered handlers. Responses may arrive in any order; correlation is
//! by id alone. A transport fault fails every outstanding request.

use crate::error::{McpError, Result};
use crate::protocol::{notifications, JsonRpcRequest, JsonRpcResponse, RequestId, PROTOCOL_VERSION};
use crate::transport::Transport;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback invoked for every notification registered under its method
pub type NotificationHandler = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// Callback invoked with every inbound text frame, before dispatch
pub type RawMessageHandler = Box<dyn Fn(&str) + Send + Sync>;

type PendingTable = Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>;

/// MCP client engine
///
/// Construction does not touch the transport; call [`Client::start`] to
/// begin draining inbound messages, then [`Client::initialize`] for the
/// protocol handshake.
pub struct Client {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
    handlers: Arc<RwLock<HashMap<String, Vec<NotificationHandler>>>>,
    raw_handlers: Arc<RwLock<Vec<RawMessageHandler>>>,
    initialized: AtomicBool,
    closed: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    done: Arc<Notify>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Create a client over an established transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            raw_handlers: Arc::new(RwLock::new(Vec::new())),
            initialized: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            done: Arc::new(Notify::new()),
            listener: Mutex::new(None),
        }
    }

    /// Start draining inbound messages
    ///
    /// Must be called exactly once, after construction and before any
    /// request is issued.
    pub async fn start(&self) -> Result<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(McpError::IllegalState("client already started".to_string()));
        }

        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        let handlers = Arc::clone(&self.handlers);
        let raw_handlers = Arc::clone(&self.raw_handlers);
        let finished = Arc::clone(&self.finished);
        let done = Arc::clone(&self.done);

        *listener = Some(tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(Some(text)) => {
                        for handler in raw_handlers.read().await.iter() {
                            handler(&text);
                        }
                        dispatch(&text, &pending, &handlers).await;
                    }
                    Ok(None) => {
                        debug!("transport closed by peer");
                        fail_pending(&pending, || McpError::TransportClosed).await;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport failed");
                        let message = e.to_string();
                        fail_pending(&pending, || McpError::TransportIo(message.clone())).await;
                        break;
                    }
                }
            }
            finished.store(true, Ordering::SeqCst);
            done.notify_waiters();
        }));

        Ok(())
    }

    /// Perform the `initialize` handshake
    ///
    /// Sends protocol version, capabilities, and client identification;
    /// on success emits the `notifications/initialized` notification and
    /// returns the server's negotiated result. Guarded against being
    /// called more than once.
    pub async fn initialize(&self, capabilities: Value, client_info: Value) -> Result<Value> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(McpError::IllegalState(
                "client already initialized".to_string(),
            ));
        }

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "clientInfo": client_info,
        });

        match self.request("initialize", Some(params)).await {
            Ok(result) => {
                if let Err(e) = self.notify(notifications::INITIALIZED, None).await {
                    warn!(error = %e, "failed to send initialized notification");
                }
                Ok(result)
            }
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Send a request and wait for its response
    ///
    /// Resolves once the matching response arrives, regardless of how many
    /// unrelated responses arrive in between. An error object in the
    /// response resolves as `McpError::Remote`.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::IllegalState("client is closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = JsonRpcRequest::new(RequestId::Number(id as i64), method, params);
        let text = serde_json::to_string(&request)?;

        debug!(id = id, method = method, "sending request");
        if let Err(e) = self.transport.send(&text).await {
            // The request never left; drop the pending entry right away
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(McpError::ClientClosed),
        }
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::IllegalState("client is closed".to_string()));
        }

        let notification = JsonRpcRequest::notification(method, params);
        let text = serde_json::to_string(&notification)?;
        self.transport.send(&text).await
    }

    /// Register a handler for a notification method
    ///
    /// Every handler registered for a method fires, in registration order,
    /// for each matching notification.
    pub async fn on_notification<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .await
            .entry(method.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Register a tap over every inbound frame, before dispatch
    pub async fn on_raw_message<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.raw_handlers.write().await.push(Box::new(handler));
    }

    /// Forward a pre-serialized frame to the transport verbatim
    pub async fn send_raw(&self, text: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::IllegalState("client is closed".to_string()));
        }
        self.transport.send(text).await
    }

    /// Wait until the inbound sequence has terminated
    ///
    /// Completes when the peer disconnects, the transport fails, or the
    /// client is closed locally.
    pub async fn closed(&self) {
        let notified = self.done.notified();
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    /// Close the client
    ///
    /// Idempotent. Every still-pending request fails with `ClientClosed`,
    /// the pending table is cleared, and the transport is closed exactly
    /// once.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }
        fail_pending(&self.pending, || McpError::ClientClosed).await;

        self.finished.store(true, Ordering::SeqCst);
        self.done.notify_waiters();

        self.transport.close().await
    }
}

/// Parse one inbound frame and route it
///
/// A frame with `method` and `id` is a server-to-client request — a
/// reserved extension point, currently ignored. A frame with `method` only
/// is a notification. Anything else is matched against the pending table;
/// unmatched ids are dropped silently.
async fn dispatch(
    text: &str,
    pending: &PendingTable,
    handlers: &RwLock<HashMap<String, Vec<NotificationHandler>>>,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "dropping unparseable frame");
            return;
        }
    };

    let has_id = value.get("id").map(|id| !id.is_null()).unwrap_or(false);
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);

    match method {
        Some(method) if has_id => {
            debug!(method = %method, "ignoring server-to-client request");
        }
        Some(method) => {
            let params = value.get("params").cloned();
            let handlers = handlers.read().await;
            match handlers.get(&method) {
                Some(list) => {
                    for handler in list {
                        handler(params.clone());
                    }
                }
                None => debug!(method = %method, "no handler for notification"),
            }
        }
        None => {
            let response: JsonRpcResponse = match serde_json::from_value(value) {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "dropping malformed frame");
                    return;
                }
            };

            let key = match &response.id {
                Some(RequestId::Number(n)) => u64::try_from(*n).ok(),
                _ => None,
            };
            let sender = match key {
                Some(key) => pending.lock().await.remove(&key),
                None => None,
            };

            match sender {
                Some(sender) => {
                    let outcome = match response.error {
                        Some(error) => Err(McpError::from(error)),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                    let _ = sender.send(outcome);
                }
                None => debug!(id = ?response.id, "dropping response with no matching request"),
            }
        }
    }
}

async fn fail_pending<F>(pending: &PendingTable, make_error: F)
where
    F: Fn() -> McpError,
{
    let mut pending = pending.lock().await;
    for (_, sender) in pending.drain() {
        let _ = sender.send(Err(make_error()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct TestTransport {
        inbound: Mutex<mpsc::UnboundedReceiver<String>>,
        outbound: mpsc::UnboundedSender<String>,
        closed: AtomicBool,
        fail_sends: bool,
    }

    fn test_transport(
        fail_sends: bool,
    ) -> (
        Arc<TestTransport>,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(TestTransport {
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            closed: AtomicBool::new(false),
            fail_sends,
        });
        (transport, in_tx, out_rx)
    }

    #[async_trait]
    impl Transport for TestTransport {
        async fn send(&self, message: &str) -> Result<()> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(McpError::TransportClosed);
            }
            if self.fail_sends {
                return Err(McpError::TransportIo("send rejected".to_string()));
            }
            self.outbound
                .send(message.to_string())
                .map_err(|_| McpError::TransportIo("peer gone".to_string()))
        }

        async fn receive(&self) -> Result<Option<String>> {
            Ok(self.inbound.lock().await.recv().await)
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn response_for(frame: &str, result: Value) -> String {
        let request: JsonRpcRequest = serde_json::from_str(frame).unwrap();
        let response = JsonRpcResponse::success(request.id.unwrap(), result);
        serde_json::to_string(&response).unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_correctly() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        let frame_one = out_rx.recv().await.unwrap();

        let second = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        let frame_two = out_rx.recv().await.unwrap();

        // Answer the second request before the first
        in_tx.send(response_for(&frame_two, json!({"n": 2}))).unwrap();
        in_tx.send(response_for(&frame_one, json!({"n": 1}))).unwrap();

        assert_eq!(first.await.unwrap().unwrap(), json!({"n": 1}));
        assert_eq!(second.await.unwrap().unwrap(), json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_identifiers_start_at_one_and_increment() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        for expected in 1..=3i64 {
            let pending = {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.request("ping", None).await })
            };
            let frame = out_rx.recv().await.unwrap();
            let request: JsonRpcRequest = serde_json::from_str(&frame).unwrap();
            assert_eq!(request.id, Some(RequestId::Number(expected)));

            in_tx.send(response_for(&frame, json!({}))).unwrap();
            pending.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped_silently() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let stray = JsonRpcResponse::success(RequestId::Number(99), json!({"stray": true}));
        in_tx.send(serde_json::to_string(&stray).unwrap()).unwrap();

        // Engine keeps working after the stray frame
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        let frame = out_rx.recv().await.unwrap();
        in_tx.send(response_for(&frame, json!({"ok": true}))).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_response_resolves_as_remote_error() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("tools/call", None).await })
        };
        let frame = out_rx.recv().await.unwrap();
        let request: JsonRpcRequest = serde_json::from_str(&frame).unwrap();
        let response = JsonRpcResponse::error(
            request.id,
            crate::protocol::JsonRpcError::tool_not_found("missing"),
        );
        in_tx.send(serde_json::to_string(&response).unwrap()).unwrap();

        match pending.await.unwrap() {
            Err(McpError::Remote { code, message, .. }) => {
                assert_eq!(code, -32000);
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_fails_all_pending_and_empties_table() {
        let (transport, _in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        out_rx.recv().await.unwrap();
        let second = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        out_rx.recv().await.unwrap();

        client.close().await.unwrap();

        assert!(matches!(
            first.await.unwrap(),
            Err(McpError::ClientClosed)
        ));
        assert!(matches!(
            second.await.unwrap(),
            Err(McpError::ClientClosed)
        ));
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _in_tx, _out_rx) = test_transport(false);
        let client = Client::new(transport);
        client.start().await.unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_after_close_is_illegal_state() {
        let (transport, _in_tx, _out_rx) = test_transport(false);
        let client = Client::new(transport);
        client.start().await.unwrap();
        client.close().await.unwrap();

        assert!(matches!(
            client.request("ping", None).await,
            Err(McpError::IllegalState(_))
        ));
        assert!(matches!(
            client.notify("notifications/initialized", None).await,
            Err(McpError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_send_removes_pending_entry() {
        let (transport, _in_tx, _out_rx) = test_transport(true);
        let client = Client::new(transport);
        client.start().await.unwrap();

        let result = client.request("ping", None).await;
        assert!(matches!(result, Err(McpError::TransportIo(_))));
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_fails_pending() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        out_rx.recv().await.unwrap();

        // Dropping the sender ends the inbound sequence like a disconnect
        drop(in_tx);

        assert!(matches!(
            pending.await.unwrap(),
            Err(McpError::TransportClosed)
        ));
        client.closed().await;
    }

    #[tokio::test]
    async fn test_notification_handlers_fire_in_registration_order() {
        let (transport, in_tx, _out_rx) = test_transport(false);
        let client = Client::new(transport);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let tx = seen_tx.clone();
        client
            .on_notification("notifications/message", move |params| {
                tx.send((1, params)).unwrap();
            })
            .await;
        let tx = seen_tx.clone();
        client
            .on_notification("notifications/message", move |params| {
                tx.send((2, params)).unwrap();
            })
            .await;

        client.start().await.unwrap();

        let notification = JsonRpcRequest::notification(
            "notifications/message",
            Some(json!({"level": "info", "data": "hi"})),
        );
        in_tx
            .send(serde_json::to_string(&notification).unwrap())
            .unwrap();

        let (first, params) = seen_rx.recv().await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(params, Some(json!({"level": "info", "data": "hi"})));
        let (second, _) = seen_rx.recv().await.unwrap();
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_dropped() {
        let (transport, in_tx, _out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let notification = JsonRpcRequest::notification("notifications/unknown", None);
        in_tx
            .send(serde_json::to_string(&notification).unwrap())
            .unwrap();

        // Listener is still alive afterwards
        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("ping", None).await })
        };
        tokio::task::yield_now().await;
        client.close().await.unwrap();
        assert!(pending.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_raw_tap_sees_every_frame() {
        let (transport, in_tx, _out_rx) = test_transport(false);
        let client = Client::new(transport);

        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();
        client
            .on_raw_message(move |text| {
                tap_tx.send(text.to_string()).unwrap();
            })
            .await;
        client.start().await.unwrap();

        in_tx.send("not even json".to_string()).unwrap();
        in_tx.send("{\"jsonrpc\":\"2.0\",\"id\":5,\"result\":{}}".to_string()).unwrap();

        assert_eq!(tap_rx.recv().await.unwrap(), "not even json");
        assert_eq!(
            tap_rx.recv().await.unwrap(),
            "{\"jsonrpc\":\"2.0\",\"id\":5,\"result\":{}}"
        );
    }

    #[tokio::test]
    async fn test_initialize_twice_is_illegal_state() {
        let (transport, in_tx, mut out_rx) = test_transport(false);
        let client = Arc::new(Client::new(transport));
        client.start().await.unwrap();

        let handshake = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .initialize(json!({}), json!({"name": "test", "version": "0"}))
                    .await
            })
        };
        let frame = out_rx.recv().await.unwrap();
        let request: JsonRpcRequest = serde_json::from_str(&frame).unwrap();
        assert_eq!(request.method, "initialize");
        let params = request.params.unwrap();
        assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);

        in_tx.send(response_for(&frame, json!({"capabilities": {}}))).unwrap();
        handshake.await.unwrap().unwrap();

        // The initialized notification follows the handshake
        let follow_up = out_rx.recv().await.unwrap();
        let notification: JsonRpcRequest = serde_json::from_str(&follow_up).unwrap();
        assert_eq!(notification.method, notifications::INITIALIZED);
        assert!(notification.is_notification());

        assert!(matches!(
            client.initialize(json!({}), json!({})).await,
            Err(McpError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_illegal_state() {
        let (transport, _in_tx, _out_rx) = test_transport(false);
        let client = Client::new(transport);
        client.start().await.unwrap();
        assert!(matches!(
            client.start().await,
            Err(McpError::IllegalState(_))
        ));
    }
}
