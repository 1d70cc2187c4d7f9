//! Tools for Courier.
//!
//! The agent's procedures are not implemented here: they live in an external
//! MCP server started over stdio. This crate launches that server, patches
//! the parameter schemas it declares, and registers each procedure in a
//! [`ToolRegistry`].

pub mod mcp;

use courier_core::tool::ToolRegistry;

pub use mcp::{
    Bootstrapper, LaunchFailure, LaunchResult, LaunchSpec, McpToolset, PatchReport,
    SchemaPatchRule, ToolsetState,
};

/// Build a registry from a launched toolset. `None` yields an empty registry.
pub fn registry_for(toolset: Option<&McpToolset>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if let Some(toolset) = toolset {
        toolset.register_into(&mut registry);
    }
    registry
}
