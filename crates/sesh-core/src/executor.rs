//! MCP tool executor.
//!
//! Sends a single JSON-RPC 2.0 `tools/call` request per command to
//! `<server>/mcp` and folds whatever comes back (non-JSON bodies, JSON-RPC
//! errors, MCP `result.content` wrappers, tool-level error payloads, transport
//! failures) into one [`Outcome`]. Nothing here retries.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::error::CoreError;

/// Maximum number of characters of a non-JSON body echoed back in a failure.
const RAW_EXCERPT_CHARS: usize = 200;

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The tool ran; payload is the decoded tool result.
    Success(Value),
    /// The call failed at the transport, protocol, or tool level.
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(message) => Some(message),
        }
    }
}

/// Executes one tool call against a remote server.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, tool: &str, arguments: &Map<String, Value>) -> Outcome;
}

/// Checks whether the remote server is reachable.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// HTTP client for an MCP server exposing a stateless `/mcp` endpoint.
#[derive(Debug, Clone)]
pub struct McpClient {
    client: Client,
    base_url: String,
}

impl McpClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:8000`).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        let client = Client::builder().build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The JSON-RPC endpoint, `<base>/mcp`.
    pub fn endpoint(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    fn transport_failure(&self, err: &reqwest::Error) -> Outcome {
        if err.is_connect() {
            Outcome::Failure(format!(
                "Could not connect to the MCP server at {}. Please ensure the server is running.",
                self.base_url
            ))
        } else {
            Outcome::Failure(err.to_string())
        }
    }
}

#[async_trait]
impl Executor for McpClient {
    #[instrument(skip(self, arguments), fields(endpoint = %self.endpoint()))]
    async fn execute(&self, tool: &str, arguments: &Map<String, Value>) -> Outcome {
        let body = tool_call_request(tool, arguments, &request_id());

        let response = match self
            .client
            .post(self.endpoint())
            .header("Accept", "application/json, text/event-stream")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(tool, error = %e, "tool call transport error");
                return self.transport_failure(&e);
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool, error = %e, "failed to read tool call response");
                return self.transport_failure(&e);
            }
        };

        let outcome = normalize_response(&text);
        match &outcome {
            Outcome::Success(_) => debug!(tool, %status, "tool call succeeded"),
            Outcome::Failure(message) => warn!(tool, %status, error = %message, "tool call failed"),
        }
        outcome
    }
}

#[async_trait]
impl HealthProbe for McpClient {
    async fn probe(&self) -> bool {
        match self.client.get(format!("{}/", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }
}

/// Scene-level actions that bypass the command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    Undo,
    Redo,
    /// Delete every object in the scene. Confirm before sending.
    ClearScene,
}

impl RemoteAction {
    pub fn tool(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::ClearScene => "delete_object",
        }
    }

    pub fn arguments(self) -> Map<String, Value> {
        let mut arguments = Map::new();
        if self == Self::ClearScene {
            arguments.insert("pattern".to_owned(), Value::String("*".to_owned()));
        }
        arguments
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::ClearScene => "Clear Scene",
        }
    }

    /// Send this action through `executor`.
    pub async fn send<E: Executor>(self, executor: &E) -> Outcome {
        debug!(action = self.label(), "sending remote action");
        executor.execute(self.tool(), &self.arguments()).await
    }
}

/// Build the JSON-RPC 2.0 `tools/call` request body.
pub fn tool_call_request(tool: &str, arguments: &Map<String, Value>, id: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments },
        "id": id,
    })
}

/// A fresh opaque request id.
fn request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Fold a raw response body into an [`Outcome`].
///
/// Order matters: non-JSON, then the JSON-RPC `error` field, then
/// `result.content[0].text`, then the bare `result` (or the whole body).
pub fn normalize_response(body: &str) -> Outcome {
    let data: Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(_) => {
            let excerpt: String = body.chars().take(RAW_EXCERPT_CHARS).collect();
            return Outcome::Failure(format!("Server returned non-JSON: {excerpt}"));
        }
    };

    if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
        return Outcome::Failure(error_message(error));
    }

    let result = data.get("result").filter(|r| !r.is_null());

    if let Some(content) = result.and_then(|r| r.get("content")) {
        let text = content
            .get(0)
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        return match serde_json::from_str::<Value>(text) {
            Ok(payload) => tool_payload_outcome(payload),
            Err(_) => Outcome::Success(json!({ "result": text })),
        };
    }

    Outcome::Success(result.cloned().unwrap_or(data))
}

/// Tool results report their own errors as `{"error": ...}` or
/// `{"status": "error", "message": ...}` inside a successful envelope.
fn tool_payload_outcome(payload: Value) -> Outcome {
    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        return Outcome::Failure(error_message(error));
    }
    if payload.get("status").and_then(Value::as_str) == Some("error") {
        let message = payload
            .get("message")
            .map(error_message)
            .unwrap_or_else(|| payload.to_string());
        return Outcome::Failure(message);
    }
    Outcome::Success(payload)
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| other.to_string()),
    }
}
