//! Model Context Protocol server over stdio.
//!
//! Frames are newline-delimited JSON-RPC 2.0 messages. Stdout carries protocol
//! frames only; diagnostics go to stderr through `tracing`. Each `tools/call`
//! runs on its own thread so a long test run does not block lint or ping
//! requests issued meanwhile.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::tools::{TestOps, ToolCall};

/// MCP protocol revision this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "TestOps";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Notifications carry no id and never get a response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}

/// `tools/list` payload.
pub fn tool_definitions() -> Value {
    json!({
        "tools": [
            {
                "name": "run_tests",
                "description": "Run the project's test suite (npm/yarn/pnpm test or pytest -q), optionally filtered by test name.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "pattern": { "type": "string", "description": "Test name filter (-t for Node, -k for pytest)." },
                        "timeout_sec": { "type": "integer", "minimum": 1, "default": 300 }
                    }
                }
            },
            {
                "name": "run_lint",
                "description": "Run eslint or ruff across the whole project.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "timeout_sec": { "type": "integer", "minimum": 1, "default": 180 }
                    }
                }
            },
            {
                "name": "run_typecheck",
                "description": "Run tsc in check mode, or pyright/mypy for Python projects.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "timeout_sec": { "type": "integer", "minimum": 1, "default": 300 }
                    }
                }
            },
            {
                "name": "apply_patch",
                "description": "Validate a unified diff with git apply --check and optionally apply it. Diffs touching infra/, db/migrations/ or secrets are rejected.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "diff_text": { "type": "string" },
                        "dry_run": { "type": "boolean", "default": true }
                    },
                    "required": ["diff_text"]
                }
            },
            {
                "name": "git_commit",
                "description": "Commit staged changes with git commit --no-verify.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" }
                    },
                    "required": ["message"]
                }
            }
        ]
    })
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// Handle one request synchronously. Returns `None` for notifications.
#[instrument(skip_all, fields(method = %request.method))]
pub fn handle_request(ops: &TestOps, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        debug!("notification received");
        return None;
    }
    let id = request.id;
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, tool_definitions()),
        "tools/call" => handle_tool_call(ops, id, request.params),
        other => {
            warn!(method = other, "unknown method");
            JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )
        }
    };
    Some(response)
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn handle_tool_call(ops: &TestOps, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
    let params = match params.map(serde_json::from_value::<CallParams>).transpose() {
        Ok(Some(params)) => params,
        Ok(None) => {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "missing params");
        }
        Err(e) => {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("invalid tools/call params: {e}"),
            );
        }
    };

    let call = match ToolCall::parse(&params.name, params.arguments) {
        Ok(call) => call,
        Err(err) => {
            warn!(%err, "rejecting tool call");
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, err.to_string());
        }
    };

    info!(tool = %params.name, "tool call started");
    let (payload, is_error) = match ops.dispatch(&call) {
        Ok(payload) => (payload, false),
        Err(err) => {
            warn!(tool = %params.name, kind = err.kind(), %err, "tool call failed");
            (err.to_payload(), true)
        }
    };
    info!(tool = %params.name, is_error, "tool call finished");
    JsonRpcResponse::success(id, tool_result(&payload, is_error))
}

fn tool_result(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

/// Serve requests from `input` until EOF, writing responses to `output`.
///
/// Tool calls run concurrently; all in-flight calls are finished before this
/// returns.
pub fn serve<R, W>(ops: TestOps, input: R, output: W) -> Result<()>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let ops = Arc::new(ops);
    let output = Arc::new(Mutex::new(output));
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    info!(root = %ops.root().display(), "mcp server listening on stdio");

    for line in input.lines() {
        let line = line.context("read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        in_flight.retain(|handle| !handle.is_finished());

        let request = match decode_request(&line) {
            Ok(request) => request,
            Err(response) => {
                write_frame(&output, &response)?;
                continue;
            }
        };

        if request.method == "tools/call" && !request.is_notification() {
            let ops = Arc::clone(&ops);
            let output = Arc::clone(&output);
            in_flight.push(thread::spawn(move || {
                if let Some(response) = handle_request(&ops, request)
                    && let Err(e) = write_frame(&output, &response)
                {
                    warn!(err = %e, "failed to write tool response");
                }
            }));
            continue;
        }

        if let Some(response) = handle_request(&ops, request) {
            write_frame(&output, &response)?;
        }
    }

    debug!(pending = in_flight.len(), "input closed, draining tool calls");
    for handle in in_flight {
        if handle.join().is_err() {
            warn!("tool call thread panicked");
        }
    }
    Ok(())
}

fn decode_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        JsonRpcResponse::error(None, error_codes::PARSE_ERROR, format!("parse error: {e}"))
    })?;
    let id = value.get("id").cloned();
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            format!("invalid request: {e}"),
        )
    })
}

fn write_frame<W: Write>(output: &Mutex<W>, response: &JsonRpcResponse) -> Result<()> {
    let mut frame = serde_json::to_string(response).context("serialize response")?;
    frame.push('\n');
    let mut out = output
        .lock()
        .map_err(|_| anyhow!("output writer poisoned"))?;
    out.write_all(frame.as_bytes()).context("write response")?;
    out.flush().context("flush response")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{ServiceConfig, TestOpsConfig};
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn frames(&self) -> Vec<Value> {
            let bytes = self.0.lock().expect("lock").clone();
            String::from_utf8(bytes)
                .expect("utf8")
                .lines()
                .map(|line| serde_json::from_str(line).expect("frame json"))
                .collect()
        }
    }

    fn ops(root: &std::path::Path) -> TestOps {
        TestOps::new(ServiceConfig::new(root, TestOpsConfig::default()))
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[test]
    fn initialize_reports_server_info() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(&ops(temp.path()), request(1, "initialize", json!({})))
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    }

    #[test]
    fn tools_list_names_all_tools() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(&ops(temp.path()), request(2, "tools/list", json!({})))
            .expect("response");
        let result = response.result.expect("result");
        let names: Vec<&str> = result["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .map(|tool| tool["name"].as_str().expect("name"))
            .collect();
        assert_eq!(names, crate::tools::TOOL_NAMES.to_vec());
    }

    #[test]
    fn notifications_get_no_response() {
        let temp = tempfile::tempdir().expect("tempdir");
        let note = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(handle_request(&ops(temp.path()), note).is_none());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(&ops(temp.path()), request(3, "resources/list", json!({})))
            .expect("response");
        assert_eq!(
            response.error.expect("error").code,
            error_codes::METHOD_NOT_FOUND
        );
    }

    #[test]
    fn tool_failure_is_reported_in_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(
            &ops(temp.path()),
            request(
                4,
                "tools/call",
                json!({"name": "git_commit", "arguments": {"message": "  "}}),
            ),
        )
        .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().expect("text");
        let payload: Value = serde_json::from_str(text).expect("payload json");
        assert_eq!(payload["error"], "InvalidArgument");
    }

    #[test]
    fn unsupported_project_surfaces_as_tool_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(
            &ops(temp.path()),
            request(5, "tools/call", json!({"name": "run_tests"})),
        )
        .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["isError"], true);
        assert!(
            result["content"][0]["text"]
                .as_str()
                .expect("text")
                .contains("UnsupportedProject")
        );
    }

    #[test]
    fn bad_arguments_are_invalid_params() {
        let temp = tempfile::tempdir().expect("tempdir");
        let response = handle_request(
            &ops(temp.path()),
            request(6, "tools/call", json!({"name": "apply_patch", "arguments": {}})),
        )
        .expect("response");
        assert_eq!(
            response.error.expect("error").code,
            error_codes::INVALID_PARAMS
        );
    }

    #[test]
    fn serve_answers_each_request_and_skips_garbage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "not json",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"git_commit","arguments":{"message":""}}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        ]
        .join("\n");
        let out = SharedBuf::default();
        serve(ops(temp.path()), Cursor::new(input), out.clone()).expect("serve");

        let frames = out.frames();
        assert_eq!(frames.len(), 4);
        let mut ids: Vec<Value> = frames.iter().map(|f| f["id"].clone()).collect();
        ids.sort_by_key(|id| id.as_i64().unwrap_or(-1));
        assert_eq!(ids, vec![Value::Null, json!(1), json!(2), json!(3)]);
        let parse_error = frames
            .iter()
            .find(|f| f["id"].is_null())
            .expect("parse error frame");
        assert_eq!(parse_error["error"]["code"], error_codes::PARSE_ERROR);
    }
}
