//! Startup wiring: launch the tool provider, patch its declarations,
//! register its procedures, and build the agent definition.
//!
//! Nothing here aborts startup. Each step's outcome is returned in
//! [`Bootstrap`] and the host decides what to do with it.

use std::sync::Arc;

use courier_config::AppConfig;
use courier_core::agent::AgentDefinition;
use courier_core::event::{DomainEvent, EventBus};
use courier_core::tool::ToolRegistry;
use courier_tools::mcp::{
    Bootstrapper, LaunchFailure, LaunchResult, McpToolset, PatchReport, SchemaPatchRule,
    apply_or_skip,
};
use tracing::{info, warn};

use crate::definition::{MESSAGING_INSTRUCTION, SEND_TOOL};

/// Everything startup produced.
#[derive(Debug)]
pub struct Bootstrap {
    pub definition: Arc<AgentDefinition>,
    /// The live toolset; dropping it stops the provider process
    pub toolset: Option<McpToolset>,
    /// Why there is no toolset, when there is none
    pub launch_failure: Option<LaunchFailure>,
    /// `None` when the patch was disabled, skipped, or failed
    pub patch: Option<PatchReport>,
}

impl Bootstrap {
    pub fn has_tools(&self) -> bool {
        self.definition.has_tools()
    }

    pub async fn shutdown(&self) {
        if let Some(toolset) = &self.toolset {
            toolset.shutdown().await;
        }
    }
}

pub async fn bootstrap(config: &AppConfig, events: &EventBus) -> Bootstrap {
    let mut bootstrapper = Bootstrapper::new();
    let (mut toolset, launch_failure) = match bootstrapper.launch_from_config(&config.mcp).await {
        LaunchResult::Ready(toolset) => (Some(toolset), None),
        LaunchResult::Failed(failure) => (None, Some(failure)),
    };

    match (&toolset, &launch_failure) {
        (Some(toolset), _) => events.publish(DomainEvent::ToolsetReady {
            server: toolset.server_name().to_string(),
            tool_count: toolset.tools().len(),
            timestamp: chrono::Utc::now(),
        }),
        (None, Some(failure)) => events.publish(DomainEvent::ToolsetUnavailable {
            reason: failure.to_string(),
            timestamp: chrono::Utc::now(),
        }),
        (None, None) => {}
    }

    let patch = match (toolset.as_mut(), SchemaPatchRule::from_config(&config.mcp.schema_patch)) {
        (Some(toolset), Some(rule)) => apply_or_skip(toolset.tools_mut(), &rule),
        (Some(_), None) => {
            info!("Schema patch disabled");
            None
        }
        (None, _) => None,
    };

    let registry = courier_tools::registry_for(toolset.as_ref());
    let definition = assemble_definition(config, registry);

    Bootstrap {
        definition: Arc::new(definition),
        toolset,
        launch_failure,
        patch,
    }
}

/// Build the agent definition from configuration and a populated registry.
pub fn assemble_definition(config: &AppConfig, tools: ToolRegistry) -> AgentDefinition {
    if tools.is_empty() {
        warn!("No tools available; the agent will not be able to send WhatsApp messages");
    } else if !tools.contains(SEND_TOOL) {
        warn!(
            tools = ?tools.names(),
            "Tool provider does not offer '{SEND_TOOL}'; the instruction text relies on it"
        );
    }

    let instruction = config
        .agent
        .instruction_override
        .as_deref()
        .unwrap_or(MESSAGING_INSTRUCTION);

    let definition = AgentDefinition::new(
        &config.agent.name,
        &config.default_model,
        instruction,
        Arc::new(tools),
    );
    info!(
        agent = %definition.name(),
        model = %definition.model(),
        tools = ?definition.tools().names(),
        "Agent defined"
    );
    definition
}
