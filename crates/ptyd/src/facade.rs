//! Thin JSON translation layer: one `Request` in, one `Response` out.
//!
//! This is glue, not business logic — every op extracts typed arguments
//! from a loosely-typed JSON blob and calls straight through to
//! `pty_core::manager::SessionManager` / `pty_core::session::PtySession`.

use pty_core::manager::SessionManager;
use pty_core::types::{SessionConfig, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Request {
    pub op: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl Response {
    fn ok(result: Value) -> Self {
        Self { ok: true, result: Some(result), error: None }
    }

    fn err(code: &'static str, message: String) -> Self {
        tracing::warn!(code, %message, "request failed");
        Self { ok: false, result: None, error: Some(ErrorBody { code, message }) }
    }

    /// A line on stdin that didn't even parse as a `Request`.
    pub fn from_parse_error(e: serde_json::Error) -> Self {
        Self::err("INVALID_CONFIG", format!("malformed request: {e}"))
    }
}

fn bad_args(e: serde_json::Error) -> Response {
    Response::err("INVALID_CONFIG", format!("invalid arguments: {e}"))
}

fn from_core(e: pty_core::CoreError) -> Response {
    Response::err(e.code(), e.to_string())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
struct StartSessionArgs {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    cwd: Option<String>,
    timeout_session: Option<u64>,
    buffer_size: Option<usize>,
    sentinel_command: Option<String>,
}

impl From<StartSessionArgs> for SessionConfig {
    fn from(a: StartSessionArgs) -> Self {
        let defaults = SessionConfig::default();
        SessionConfig {
            command: a.command,
            args: a.args,
            cwd: a.cwd,
            idle_timeout_seconds: a.timeout_session.unwrap_or(defaults.idle_timeout_seconds),
            buffer_lines: a.buffer_size.unwrap_or(defaults.buffer_lines),
            sentinel_template: a.sentinel_command.unwrap_or(defaults.sentinel_template),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    session_id: String,
    command: String,
    #[serde(default = "default_run_timeout")]
    timeout: u64,
}

fn default_run_timeout() -> u64 {
    1_800
}

#[derive(Debug, Deserialize)]
struct SendKeysArgs {
    session_id: String,
    keys: String,
}

#[derive(Debug, Deserialize)]
struct GetBufferArgs {
    session_id: String,
    lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SetSentinelArgs {
    session_id: String,
    sentinel_command: String,
}

#[derive(Debug, Deserialize)]
struct StopSessionArgs {
    session_id: String,
}

/// Dispatch one request to the manager and produce its response.
pub async fn dispatch(manager: &SessionManager, req: Request) -> Response {
    match req.op.as_str() {
        "start_session" => {
            let args: StartSessionArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            match manager.create(args.into()).await {
                Ok(id) => Response::ok(json!({ "session_id": id.as_str() })),
                Err(e) => from_core(e),
            }
        }

        "run_command" => {
            let args: RunCommandArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            let session = match manager.get(&SessionId::from(args.session_id)).await {
                Ok(s) => s,
                Err(e) => return from_core(e),
            };
            match session.run_command(&args.command, Duration::from_secs(args.timeout)).await {
                Ok(outcome) => Response::ok(json!({
                    "output": outcome.output,
                    "timed_out": outcome.timed_out,
                })),
                Err(e) => from_core(e),
            }
        }

        "send_keys" => {
            let args: SendKeysArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            let session = match manager.get(&SessionId::from(args.session_id)).await {
                Ok(s) => s,
                Err(e) => return from_core(e),
            };
            match session.send_keys(args.keys.as_bytes()) {
                Ok(()) => Response::ok(json!({ "ack": true })),
                Err(e) => from_core(e),
            }
        }

        "get_buffer" => {
            let args: GetBufferArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            let session = match manager.get(&SessionId::from(args.session_id)).await {
                Ok(s) => s,
                Err(e) => return from_core(e),
            };
            Response::ok(json!({ "buffer": session.get_buffer(args.lines) }))
        }

        "set_sentinel" => {
            let args: SetSentinelArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            let session = match manager.get(&SessionId::from(args.session_id)).await {
                Ok(s) => s,
                Err(e) => return from_core(e),
            };
            match session.set_sentinel(args.sentinel_command) {
                Ok(()) => Response::ok(json!({ "ack": true })),
                Err(e) => from_core(e),
            }
        }

        "stop_session" => {
            let args: StopSessionArgs = match serde_json::from_value(req.args) {
                Ok(a) => a,
                Err(e) => return bad_args(e),
            };
            match manager.remove(&SessionId::from(args.session_id)).await {
                Ok(()) => Response::ok(json!({ "ack": true })),
                Err(e) => from_core(e),
            }
        }

        "list_sessions" => {
            let infos = manager.list().await;
            Response::ok(json!({ "sessions": infos }))
        }

        other => Response::err("INVALID_CONFIG", format!("unknown operation: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pty_core::types::SessionConfig;

    #[tokio::test]
    async fn unknown_op_is_rejected() {
        let manager = SessionManager::new(4, None);
        let req = Request { op: "nonsense".to_string(), args: json!({}) };
        let resp = dispatch(&manager, req).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, "INVALID_CONFIG");
    }

    #[tokio::test]
    async fn get_buffer_on_unknown_session_is_not_found() {
        let manager = SessionManager::new(4, None);
        let req = Request {
            op: "get_buffer".to_string(),
            args: json!({ "session_id": "deadbeef0000" }),
        };
        let resp = dispatch(&manager, req).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, "UNKNOWN_SESSION");
    }

    #[tokio::test]
    async fn start_session_roundtrips_through_list() {
        let manager = SessionManager::new(4, None);
        let start = dispatch(
            &manager,
            Request { op: "start_session".to_string(), args: json!({ "command": "/bin/sh" }) },
        )
        .await;
        assert!(start.ok);
        let id = start.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let list = dispatch(&manager, Request { op: "list_sessions".to_string(), args: json!({}) }).await;
        let sessions = list.result.unwrap()["sessions"].clone();
        assert!(sessions.as_array().unwrap().iter().any(|s| s["id"] == id));

        let stop = dispatch(
            &manager,
            Request { op: "stop_session".to_string(), args: json!({ "session_id": id }) },
        )
        .await;
        assert!(stop.ok);
    }

    #[test]
    fn start_session_args_map_wire_names_onto_session_config() {
        let args = StartSessionArgs {
            command: Some("/bin/sh".to_string()),
            timeout_session: Some(60),
            buffer_size: Some(50),
            sentinel_command: Some("echo {sentinel}".to_string()),
            ..Default::default()
        };
        let cfg: SessionConfig = args.into();
        assert_eq!(cfg.idle_timeout_seconds, 60);
        assert_eq!(cfg.buffer_lines, 50);
    }
}
