//! The agent definition: the one record a host needs to run a conversation.

use std::sync::Arc;

use crate::tool::ToolRegistry;

/// Identity, model, instruction text, and callable tools of an agent.
///
/// Built once at startup and shared read-only (`Arc<AgentDefinition>`) with
/// whatever hosts the conversation. The instruction text is the agent's
/// behavior; nothing here validates it against the tool list.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    name: String,
    model: String,
    instruction: String,
    tools: Arc<ToolRegistry>,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        instruction: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instruction: instruction.into(),
            tools,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}
