//! Toolset bootstrapper: start the tool provider process once and expose
//! its remote procedures as [`Tool`]s.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_config::{ENV_LAUNCHER, ENV_SERVER_DIRECTORY, McpConfig};
use courier_core::error::ToolError;
use courier_core::tool::{Tool, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

use super::client::McpClient;
use super::error::McpError;
use super::protocol::{McpTool, ServerInfo};

/// Everything needed to start the tool provider process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Label for logs
    pub server_name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Bound on spawn, handshake and tool listing together
    pub startup_timeout: Duration,
}

impl LaunchSpec {
    /// `<launcher> --directory <server_dir> run <script>`.
    ///
    /// The launcher resolves the directory itself, so no working directory
    /// is set on the child.
    pub fn uv(
        launcher: impl Into<String>,
        server_dir: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            server_name: "mcp".into(),
            command: launcher.into(),
            args: vec![
                "--directory".into(),
                server_dir.into(),
                "run".into(),
                script.into(),
            ],
            working_dir: None,
            env: HashMap::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &McpConfig) -> Result<Self, LaunchFailure> {
        if !config.enabled {
            return Err(LaunchFailure::Disabled);
        }
        let launcher = non_blank(config.launcher.as_deref()).ok_or(LaunchFailure::MissingSetting {
            setting: ENV_LAUNCHER,
        })?;
        let server_dir =
            non_blank(config.server_directory.as_deref()).ok_or(LaunchFailure::MissingSetting {
                setting: ENV_SERVER_DIRECTORY,
            })?;

        Ok(Self {
            server_name: config.server_name.clone(),
            env: config.env.clone(),
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
            ..Self::uv(launcher, server_dir, config.script.clone())
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Why no toolset is available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchFailure {
    #[error("tool provider disabled in configuration")]
    Disabled,

    #[error("{setting} is not set")]
    MissingSetting { setting: &'static str },

    #[error("launcher executable not found at '{path}'")]
    LauncherNotFound { path: String },

    #[error("{kind}: {message}")]
    Startup { kind: &'static str, message: String },

    #[error("toolset launch was already attempted")]
    AlreadyAttempted,
}

impl From<McpError> for LaunchFailure {
    fn from(err: McpError) -> Self {
        match err {
            McpError::LauncherNotFound { command } => Self::LauncherNotFound { path: command },
            other => Self::Startup {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}

pub enum LaunchResult {
    Ready(McpToolset),
    Failed(LaunchFailure),
}

impl LaunchResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn toolset(self) -> Option<McpToolset> {
        match self {
            Self::Ready(toolset) => Some(toolset),
            Self::Failed(_) => None,
        }
    }
}

impl std::fmt::Debug for LaunchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(toolset) => f.debug_tuple("Ready").field(toolset).finish(),
            Self::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolsetState {
    Uninitialized,
    Launching,
    Ready,
    Failed,
}

/// Drives a single launch attempt. There are no retries: once the state
/// leaves `Uninitialized`, further launches report `AlreadyAttempted`.
#[derive(Debug)]
pub struct Bootstrapper {
    state: ToolsetState,
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self {
            state: ToolsetState::Uninitialized,
        }
    }

    pub fn state(&self) -> ToolsetState {
        self.state
    }

    /// Resolve the launch spec from configuration, then launch.
    pub async fn launch_from_config(&mut self, config: &McpConfig) -> LaunchResult {
        if self.state != ToolsetState::Uninitialized {
            return LaunchResult::Failed(LaunchFailure::AlreadyAttempted);
        }
        match LaunchSpec::from_config(config) {
            Ok(spec) => self.launch(&spec).await,
            Err(failure) => {
                warn!(%failure, "Tool provider not started");
                self.state = ToolsetState::Failed;
                LaunchResult::Failed(failure)
            }
        }
    }

    pub async fn launch(&mut self, spec: &LaunchSpec) -> LaunchResult {
        if self.state != ToolsetState::Uninitialized {
            return LaunchResult::Failed(LaunchFailure::AlreadyAttempted);
        }
        self.state = ToolsetState::Launching;

        let result = McpToolset::start(spec).await;
        match &result {
            LaunchResult::Ready(toolset) => {
                self.state = ToolsetState::Ready;
                info!(
                    server = %toolset.server_name(),
                    tools = toolset.tools().len(),
                    "Toolset ready"
                );
            }
            LaunchResult::Failed(failure @ LaunchFailure::LauncherNotFound { .. }) => {
                self.state = ToolsetState::Failed;
                warn!(server = %spec.server_name, %failure, "Launcher not found; continuing without tools");
            }
            LaunchResult::Failed(failure) => {
                self.state = ToolsetState::Failed;
                warn!(server = %spec.server_name, %failure, "Tool provider failed to start; continuing without tools");
            }
        }
        result
    }
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

/// A live connection to the tool provider and the procedures it listed.
pub struct McpToolset {
    server_name: String,
    client: Arc<McpClient>,
    tools: Vec<McpTool>,
}

impl McpToolset {
    /// One-shot launch with a fresh [`Bootstrapper`].
    pub async fn launch(spec: &LaunchSpec) -> LaunchResult {
        Bootstrapper::new().launch(spec).await
    }

    async fn start(spec: &LaunchSpec) -> LaunchResult {
        let secs = spec.startup_timeout.as_secs();
        let started = tokio::time::timeout(spec.startup_timeout, async {
            let client = McpClient::connect(spec).await?;
            match client.list_tools().await {
                Ok(tools) => Ok((client, tools)),
                Err(e) => {
                    client.shutdown().await;
                    Err(e)
                }
            }
        })
        .await
        .unwrap_or(Err(McpError::Timeout { secs }));

        match started {
            Ok((client, tools)) => LaunchResult::Ready(Self {
                server_name: spec.server_name.clone(),
                client: Arc::new(client),
                tools,
            }),
            Err(e) => LaunchResult::Failed(e.into()),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_info(&self) -> &ServerInfo {
        self.client.server_info()
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Declarations are mutable until registered, so the schema patch can
    /// run in between.
    pub fn tools_mut(&mut self) -> &mut [McpTool] {
        &mut self.tools
    }

    /// Register every listed procedure. Returns how many were added.
    pub fn register_into(&self, registry: &mut ToolRegistry) -> usize {
        for tool in &self.tools {
            registry.register(Box::new(McpRemoteTool {
                client: Arc::clone(&self.client),
                tool: tool.clone(),
            }));
        }
        self.tools.len()
    }

    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}

impl std::fmt::Debug for McpToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        f.debug_struct("McpToolset")
            .field("server_name", &self.server_name)
            .field("tools", &names)
            .finish()
    }
}

/// One remote procedure, callable through the shared client.
pub struct McpRemoteTool {
    client: Arc<McpClient>,
    tool: McpTool,
}

#[async_trait]
impl Tool for McpRemoteTool {
    fn name(&self) -> &str {
        &self.tool.name
    }

    fn description(&self) -> &str {
        &self.tool.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.tool.input_schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let arguments = match arguments {
            serde_json::Value::Null => serde_json::json!({}),
            args @ serde_json::Value::Object(_) => args,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "arguments for '{}' must be an object, got {other}",
                    self.tool.name
                )));
            }
        };

        let started = Instant::now();
        let result = self
            .client
            .call_tool(&self.tool.name, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.tool.name.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            tool = %self.tool.name,
            is_error = result.is_error,
            duration_ms = started.elapsed().as_millis() as u64,
            "Remote procedure returned"
        );

        Ok(ToolResult {
            call_id: String::new(),
            success: !result.is_error,
            output: result.text(),
            data: None,
        })
    }
}
