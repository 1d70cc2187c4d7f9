//! Stdio transport: one child process, newline-delimited JSON-RPC on its
//! stdin/stdout, stderr forwarded to the log.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::protocol::{
    Incoming, JsonRpcRequest, JsonRpcResponse, error_codes,
};
use super::toolset::LaunchSpec;

/// A running tool provider process.
///
/// Requests are serialized: the pipe lock is held from writing a request
/// until its response has been read, so one call is in flight at a time.
/// The child is killed when the transport is dropped.
pub struct StdioTransport {
    server: String,
    pipes: Mutex<Pipes>,
    child: Mutex<Option<Child>>,
    next_id: AtomicU64,
}

struct Pipes {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Pipes {
    async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

impl StdioTransport {
    /// Start the process described by `spec`. Must run inside a tokio runtime.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, McpError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            if !dir.is_dir() {
                return Err(McpError::Spawn {
                    command: spec.command.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("working directory {} does not exist", dir.display()),
                    ),
                });
            }
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                McpError::LauncherNotFound {
                    command: spec.command.clone(),
                }
            } else {
                McpError::Spawn {
                    command: spec.command.clone(),
                    source,
                }
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Io(std::io::Error::other("child stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Io(std::io::Error::other("child stdout was not captured")))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(spec.server_name.clone(), stderr);
        }

        info!(
            server = %spec.server_name,
            command = %spec.command,
            args = ?spec.args,
            pid = child.id(),
            "Started tool provider process"
        );

        Ok(Self {
            server: spec.server_name.clone(),
            pipes: Mutex::new(Pipes {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            child: Mutex::new(Some(child)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a request and wait for its response's `result`.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let expected_id = Some(serde_json::Value::from(id));
        let mut pipes = self.pipes.lock().await;

        debug!(server = %self.server, id, method, "-> request");
        pipes.send(&JsonRpcRequest::new(id, method, params)).await?;

        loop {
            let Some(line) = pipes.stdout.next_line().await? else {
                return Err(McpError::Closed {
                    method: method.to_string(),
                });
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Incoming::parse(line) {
                Ok(Incoming::Response(response)) if response.id == expected_id => {
                    debug!(server = %self.server, id, method, "<- response");
                    return into_result(method, response);
                }
                // An error the server could not attribute. Only this request
                // is pending, so it is the answer.
                Ok(Incoming::Response(response))
                    if response.id.is_none() && response.error.is_some() =>
                {
                    debug!(server = %self.server, id, method, "<- unattributed error");
                    return into_result(method, response);
                }
                Ok(Incoming::Response(response)) => {
                    debug!(server = %self.server, id = ?response.id, "Ignoring response to an unknown request");
                }
                Ok(Incoming::Request(request)) => {
                    self.answer_server_request(&mut pipes, request).await?;
                }
                Err(_) => {
                    debug!(server = %self.server, line, "Ignoring non-protocol output on stdout");
                }
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let mut pipes = self.pipes.lock().await;
        debug!(server = %self.server, method, "-> notification");
        pipes
            .send(&JsonRpcRequest::notification(method, params))
            .await
    }

    /// Server-initiated traffic while we wait: answer pings, refuse anything
    /// else that expects a reply, log notifications.
    async fn answer_server_request(
        &self,
        pipes: &mut Pipes,
        request: JsonRpcRequest,
    ) -> Result<(), McpError> {
        let Some(id) = request.id else {
            debug!(server = %self.server, method = %request.method, "<- notification");
            return Ok(());
        };

        let reply = if request.method == "ping" {
            JsonRpcResponse::success(Some(id), serde_json::json!({}))
        } else {
            debug!(server = %self.server, method = %request.method, "Refusing server request");
            JsonRpcResponse::error(
                Some(id),
                error_codes::METHOD_NOT_FOUND,
                format!("client does not handle '{}'", request.method),
            )
        };
        pipes.send(&reply).await
    }

    /// Kill the process and reap it. Safe to call more than once.
    pub async fn shutdown(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match child.kill().await {
            Ok(()) => info!(server = %self.server, "Tool provider process stopped"),
            Err(e) => warn!(server = %self.server, "Failed to stop tool provider process: {e}"),
        }
    }
}

fn into_result(method: &str, response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(error) = response.error {
        return Err(McpError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }
    response.result.ok_or_else(|| McpError::EmptyResponse {
        method: method.to_string(),
    })
}

fn forward_stderr(server: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                debug!(server = %server, "[stderr] {line}");
            }
        }
    });
}
