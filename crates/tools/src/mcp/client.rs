//! MCP client over a [`StdioTransport`].

use tracing::{debug, info};

use super::error::McpError;
use super::protocol::{
    InitializeResult, ListToolsResult, McpTool, ServerInfo, ToolCallResult, initialize_params,
};
use super::toolset::LaunchSpec;
use super::transport::StdioTransport;

/// Upper bound on `tools/list` pages, guarding against a server that keeps
/// returning the same cursor.
const MAX_LIST_PAGES: usize = 64;

pub struct McpClient {
    transport: StdioTransport,
    server_info: ServerInfo,
}

impl McpClient {
    /// Spawn the server and run the `initialize` handshake.
    pub async fn connect(spec: &LaunchSpec) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(spec)?;

        let raw = transport
            .request("initialize", Some(initialize_params()))
            .await?;
        let init: InitializeResult = serde_json::from_value(raw)?;
        transport.notify("notifications/initialized", None).await?;

        info!(
            server = %spec.server_name,
            server_name = %init.server_info.name,
            server_version = %init.server_info.version,
            protocol = %init.protocol_version,
            "Tool provider initialized"
        );

        Ok(Self {
            transport,
            server_info: init.server_info,
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Every tool the server offers, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let raw = self.transport.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(raw)?;
            debug!(count = page.tools.len(), "Received tool listing page");
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a remote procedure.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, McpError> {
        let raw = self
            .transport
            .request(
                "tools/call",
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
