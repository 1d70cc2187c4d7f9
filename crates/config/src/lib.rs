//! Configuration loading, validation, and management for Courier.
//!
//! Loads configuration from `~/.courier/config.toml`, then applies a `.env`
//! file from the working directory and environment variable overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the launcher executable (e.g. `uv`).
pub const ENV_LAUNCHER: &str = "UV_EXECUTABLE_PATH";

/// Environment variable naming the tool provider's project directory.
pub const ENV_SERVER_DIRECTORY: &str = "PYTHON_MCP_SERVER_DIRECTORY";

/// API key variables, highest priority first.
const API_KEY_VARS: [&str; 3] = ["COURIER_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// The root configuration structure.
///
/// Maps directly to `~/.courier/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool provider (MCP server) settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("mcp", &self.mcp)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// The agent record: who it is and how long a turn may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Replace the built-in messaging instruction text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_override: Option<String>,

    /// Model round-trips allowed per user turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_agent_name() -> String {
    "WhatsApp_Orchestrator_Agent".into()
}
fn default_max_tool_iterations() -> u32 {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            instruction_override: None,
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

/// How to launch the tool provider process.
///
/// The process is started as
/// `<launcher> --directory <server_directory> run <script>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Label used in logs and tool listings
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Launcher executable; `UV_EXECUTABLE_PATH` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<String>,

    /// Server project directory; `PYTHON_MCP_SERVER_DIRECTORY` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_directory: Option<String>,

    #[serde(default = "default_script")]
    pub script: String,

    /// Upper bound on spawn + handshake + tool listing
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Extra environment for the child process
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub schema_patch: SchemaPatchConfig,
}

fn default_server_name() -> String {
    "whatsapp".into()
}
fn default_script() -> String {
    "main.py".into()
}
fn default_startup_timeout() -> u64 {
    30
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_name: default_server_name(),
            launcher: None,
            server_directory: None,
            script: default_script(),
            startup_timeout_secs: default_startup_timeout(),
            env: HashMap::new(),
            schema_patch: SchemaPatchConfig::default(),
        }
    }
}

/// Which parameters get their scalar `type` cleared when they also declare
/// `anyOf`. Only parameters matching both lists are touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaPatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_patch_tools")]
    pub tools: Vec<String>,

    #[serde(default = "default_patch_parameters")]
    pub parameters: Vec<String>,
}

fn default_patch_tools() -> Vec<String> {
    vec!["list_messages".into(), "list_chats".into()]
}
fn default_patch_parameters() -> Vec<String> {
    ["after", "before", "sender_phone_number", "chat_jid", "query"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SchemaPatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tools: default_patch_tools(),
            parameters: default_patch_parameters(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.courier/config.toml).
    ///
    /// A `.env` file in the working directory is read first, so its entries
    /// take part in the environment overrides:
    /// - `COURIER_API_KEY`, `GEMINI_API_KEY`, `GOOGLE_API_KEY` (first found,
    ///   only when the file has no key)
    /// - `COURIER_PROVIDER`, `COURIER_MODEL`
    /// - `UV_EXECUTABLE_PATH`, `PYTHON_MCP_SERVER_DIRECTORY`
    pub fn load() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = API_KEY_VARS.iter().find_map(|key| non_empty(key));
        }
        if let Some(provider) = non_empty("COURIER_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = non_empty("COURIER_MODEL") {
            self.default_model = model;
        }
        if let Some(launcher) = non_empty(ENV_LAUNCHER) {
            self.mcp.launcher = Some(launcher);
        }
        if let Some(dir) = non_empty(ENV_SERVER_DIRECTORY) {
            self.mcp.server_directory = Some(dir);
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".courier")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        if self.mcp.startup_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "mcp.startup_timeout_secs must be at least 1".into(),
            ));
        }

        if self.mcp.script.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mcp.script must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            mcp: McpConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
