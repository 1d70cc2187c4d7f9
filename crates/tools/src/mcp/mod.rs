//! Model Context Protocol client over stdio.
//!
//! One tool provider process is spawned, initialized, and its procedures
//! are wrapped as [`courier_core::tool::Tool`]s.

pub mod client;
pub mod error;
pub mod protocol;
pub mod sanitize;
pub mod toolset;
pub mod transport;

pub use client::McpClient;
pub use error::McpError;
pub use protocol::{McpTool, ServerInfo, ToolCallResult};
pub use sanitize::{
    PatchError, PatchReport, PatchedParameter, SchemaPatchRule, apply_or_skip, patch_declarations,
};
pub use toolset::{
    Bootstrapper, LaunchFailure, LaunchResult, LaunchSpec, McpRemoteTool, McpToolset,
    ToolsetState,
};
pub use transport::StdioTransport;
