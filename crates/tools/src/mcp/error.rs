use thiserror::Error;

/// Failures talking to a tool provider process.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("launcher executable not found: {command}")]
    LauncherNotFound { command: String },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on server pipe: {0}")]
    Io(#[from] std::io::Error),

    #[error("server closed its output before answering '{method}'")]
    Closed { method: String },

    #[error("malformed server message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("server returned error {code} for '{method}': {message}")]
    Rpc {
        method: String,
        code: i32,
        message: String,
    },

    #[error("'{method}' response carried neither result nor error")]
    EmptyResponse { method: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl McpError {
    /// Short class name used when reporting startup failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LauncherNotFound { .. } => "LauncherNotFound",
            Self::Spawn { .. } => "SpawnError",
            Self::Io(_) => "IoError",
            Self::Closed { .. } => "ServerClosed",
            Self::Serialization(_) => "ProtocolError",
            Self::Rpc { .. } => "RpcError",
            Self::EmptyResponse { .. } => "ProtocolError",
            Self::Timeout { .. } => "Timeout",
        }
    }
}
