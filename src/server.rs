//! MCP server: newline-delimited JSON-RPC over stdio.

use crate::client::AbuseIpDbClient;
use crate::config::Config;
use crate::error::ClientError;
use crate::protocol::{error_codes, methods, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use crate::service::ToolService;
use crate::tools::get_tool_definitions;
use anyhow::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// Maximum accepted line size in bytes.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// A running tool call. `seq` tells apart calls that reuse a request id.
struct InFlightCall {
    seq: u64,
    handle: AbortHandle,
}

type InFlight = Arc<Mutex<HashMap<JsonRpcId, InFlightCall>>>;

/// MCP server exposing the AbuseIPDB tools.
pub struct McpServer {
    service: ToolService,
    name: String,
    in_flight: InFlight,
    next_seq: AtomicU64,
}

impl McpServer {
    /// Create a server backed by the live AbuseIPDB API.
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = AbuseIpDbClient::new(&config.abuseipdb)?;
        Ok(Self::with_service(
            ToolService::new(Arc::new(client)),
            config.server.name.clone(),
        ))
    }

    /// Create a server around an existing tool service.
    pub fn with_service(service: ToolService, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Handle one raw message and return the response, if one is due.
    ///
    /// Tool calls are awaited inline; `serve` runs them concurrently instead.
    pub async fn handle_request(&self, line: &str) -> Option<JsonRpcResponse> {
        match parse_request(line) {
            Ok(request) => self.dispatch(request).await,
            Err(response) => Some(response),
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
            ));
        }

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        let id = request.id.clone();
        let params = request.params.unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(id, self.initialize_result()),
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => {
                JsonRpcResponse::success(id, json!({ "tools": get_tool_definitions() }))
            }
            methods::TOOLS_CALL => match tool_call_params(&params) {
                Some((name, arguments)) => {
                    let output = self.service.call_tool(name, arguments).await;
                    JsonRpcResponse::success(id, output.to_call_result())
                }
                None => JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "tools/call requires a string 'name'",
                ),
            },
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": crate::protocol::PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.name,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::NOTIFICATION_INITIALIZED => info!("Client initialized"),
            methods::NOTIFICATION_CANCELLED => {
                let request_id = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok());
                match request_id {
                    Some(id) => self.cancel(&id),
                    None => debug!("Cancellation without a usable requestId"),
                }
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Abort an in-flight tool call. Its response is never sent.
    fn cancel(&self, id: &JsonRpcId) {
        let call = lock(&self.in_flight).remove(id);
        match call {
            Some(call) => {
                call.handle.abort();
                info!(request_id = ?id, "Cancelled in-flight tool call");
            }
            None => debug!(request_id = ?id, "Cancellation for unknown or finished request"),
        }
    }

    /// Run the server on stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        info!(server = %self.name, "Server ready, waiting for requests on stdio");
        self.serve(reader, writer).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to `writer`.
    ///
    /// Each `tools/call` runs in its own task; responses are written in
    /// completion order. Returns once the input ends and in-flight calls finish.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = match read_line_bounded(&mut reader, &mut line, MAX_LINE_BYTES).await
            {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!(error = %e, "Rejected oversized message");
                    let _ = tx.send(JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        e.to_string(),
                    ));
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from input");
                    return Err(anyhow::anyhow!("input read error: {}", e));
                }
            };

            if bytes_read == 0 {
                info!("Input closed (EOF), shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(raw = trimmed, "Received");

            let request = match parse_request(trimmed) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(response);
                    continue;
                }
            };

            let is_tool_call = request.method == methods::TOOLS_CALL && request.jsonrpc == "2.0";
            match request.id.clone() {
                Some(id) if is_tool_call => {
                    self.spawn_tool_call(id, request, tx.clone());
                }
                _ => {
                    if let Some(response) = self.dispatch(request).await {
                        let _ = tx.send(response);
                    }
                }
            }
        }

        drop(tx);
        writer_task
            .await
            .map_err(|e| anyhow::anyhow!("writer task failed: {}", e))??;
        info!("Server loop exiting");
        Ok(())
    }

    fn spawn_tool_call(
        &self,
        id: JsonRpcId,
        request: JsonRpcRequest,
        tx: mpsc::UnboundedSender<JsonRpcResponse>,
    ) {
        let service = self.service.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let task_id = id.clone();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        // Held across spawn so the task cannot deregister before it is registered.
        let mut guard = lock(&self.in_flight);
        let handle = tokio::spawn(async move {
            let params = request.params.unwrap_or(Value::Null);
            let response = match tool_call_params(&params) {
                Some((name, arguments)) => {
                    let output = service.call_tool(name, arguments).await;
                    JsonRpcResponse::success(Some(task_id.clone()), output.to_call_result())
                }
                None => JsonRpcResponse::error(
                    Some(task_id.clone()),
                    error_codes::INVALID_PARAMS,
                    "tools/call requires a string 'name'",
                ),
            };
            {
                let mut calls = lock(&in_flight);
                if calls.get(&task_id).is_some_and(|call| call.seq == seq) {
                    calls.remove(&task_id);
                }
            }
            let _ = tx.send(response);
        });
        let call = InFlightCall {
            seq,
            handle: handle.abort_handle(),
        };
        if guard.insert(id.clone(), call).is_some() {
            warn!(request_id = ?id, "Duplicate request id; earlier call can no longer be cancelled");
        }
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<JsonRpcId, InFlightCall>> {
    in_flight
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Extract `(name, arguments)` from `tools/call` params.
fn tool_call_params(params: &Value) -> Option<(&str, &Value)> {
    static NO_ARGUMENTS: Value = Value::Null;
    let name = params.get("name")?.as_str()?;
    let arguments = params.get("arguments").unwrap_or(&NO_ARGUMENTS);
    Some((name, arguments))
}

fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "Failed to parse message");
        JsonRpcResponse::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<JsonRpcId>(id).ok());

    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            format!("Invalid request: {}", e),
        )
    })
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_json = serde_json::to_string(&response)?;
        debug!(raw = %response_json, "Sending");
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

/// Read one line of at most `max_bytes` (newline included) into `buf`.
///
/// Longer lines fail with `InvalidData` and are skipped up to their newline,
/// so the next call starts on a fresh message.
pub async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_bytes: usize,
) -> std::io::Result<usize> {
    let mut raw = Vec::new();
    let limit = max_bytes as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut raw).await?;

    if read > max_bytes {
        if raw.last() != Some(&b'\n') {
            skip_line(reader).await?;
        }
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Line exceeds {} byte limit", max_bytes),
        ));
    }

    buf.push_str(&String::from_utf8_lossy(&raw));
    Ok(read)
}

/// Discard input through the next newline or EOF.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = chunk.len();
        reader.consume(len);
    }
}
