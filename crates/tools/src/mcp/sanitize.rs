//! Schema patch for tool declarations.
//!
//! Some tool providers declare optional parameters as
//! `{"type": "string", "anyOf": [{"type": "string"}, {"type": "null"}]}`.
//! The Gemini function-calling validator rejects a scalar `type` next to a
//! non-empty `anyOf`, so for allow-listed tools and parameters the `type` key
//! is removed and `anyOf` kept.
//!
//! Only the `type` key of a matched property is touched; every other byte of
//! the declaration is left as the server sent it.

use std::collections::BTreeSet;

use courier_config::SchemaPatchConfig;
use courier_core::schema::Schema;
use tracing::{debug, info, warn};

use super::protocol::McpTool;

/// Which tools and parameters may be patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPatchRule {
    tools: BTreeSet<String>,
    parameters: BTreeSet<String>,
}

impl SchemaPatchRule {
    pub fn new<T, P>(tools: T, parameters: P) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// `None` when the patch is switched off.
    pub fn from_config(config: &SchemaPatchConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.tools.iter().cloned(), config.parameters.iter().cloned()))
    }

    pub fn applies_to_tool(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    pub fn matches(&self, tool: &str, parameter: &str) -> bool {
        self.applies_to_tool(tool) && self.parameters.contains(parameter)
    }
}

impl Default for SchemaPatchRule {
    fn default() -> Self {
        Self::from_config(&SchemaPatchConfig::default())
            .unwrap_or_else(|| Self::new(Vec::<String>::new(), Vec::<String>::new()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedParameter {
    pub tool: String,
    pub parameter: String,
    /// The type that was removed, e.g. `string` or `string|null`
    pub previous_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Allow-listed tools found in the listing
    pub inspected_tools: usize,
    pub patched: Vec<PatchedParameter>,
}

impl PatchReport {
    pub fn is_empty(&self) -> bool {
        self.patched.is_empty()
    }

    pub fn contains(&self, tool: &str, parameter: &str) -> bool {
        self.patched
            .iter()
            .any(|p| p.tool == tool && p.parameter == parameter)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("cannot read schema of parameter '{parameter}' on '{tool}': {source}")]
    UnreadableSchema {
        tool: String,
        parameter: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'properties' of '{tool}' is not an object")]
    MalformedProperties { tool: String },
}

/// Clear the scalar `type` of every matched parameter that also declares a
/// non-empty `anyOf`.
///
/// All-or-nothing: every matched parameter is read before anything is
/// changed, so on error the declarations are exactly as they were.
pub fn patch_declarations(
    tools: &mut [McpTool],
    rule: &SchemaPatchRule,
) -> Result<PatchReport, PatchError> {
    let mut report = PatchReport::default();
    let mut pending: Vec<(usize, String)> = Vec::new();

    for (index, tool) in tools.iter().enumerate() {
        if !rule.applies_to_tool(&tool.name) {
            continue;
        }
        report.inspected_tools += 1;

        let Some(properties) = tool.input_schema.get("properties") else {
            continue;
        };
        let properties = properties
            .as_object()
            .ok_or_else(|| PatchError::MalformedProperties {
                tool: tool.name.clone(),
            })?;

        for (parameter, raw) in properties {
            if !rule.matches(&tool.name, parameter) {
                continue;
            }
            let schema = Schema::from_value(raw).map_err(|source| PatchError::UnreadableSchema {
                tool: tool.name.clone(),
                parameter: parameter.clone(),
                source,
            })?;
            if schema.is_ambiguous_union() {
                report.patched.push(PatchedParameter {
                    tool: tool.name.clone(),
                    parameter: parameter.clone(),
                    previous_type: schema.schema_type.to_string(),
                });
                pending.push((index, parameter.clone()));
            }
        }
    }

    for (index, parameter) in pending {
        if let Some(property) = tools[index]
            .input_schema
            .get_mut("properties")
            .and_then(|p| p.get_mut(&parameter))
            .and_then(|p| p.as_object_mut())
        {
            property.remove("type");
        }
    }

    Ok(report)
}

/// Run the patch, logging the outcome. On error the toolset is left
/// unpatched and `None` is returned.
pub fn apply_or_skip(tools: &mut [McpTool], rule: &SchemaPatchRule) -> Option<PatchReport> {
    if tools.is_empty() {
        debug!("No tool declarations to patch");
        return Some(PatchReport::default());
    }

    match patch_declarations(tools, rule) {
        Ok(report) => {
            for patched in &report.patched {
                info!(
                    tool = %patched.tool,
                    parameter = %patched.parameter,
                    previous_type = %patched.previous_type,
                    "Cleared ambiguous parameter type"
                );
            }
            if report.is_empty() {
                debug!(inspected = report.inspected_tools, "No parameter schemas needed patching");
            }
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "Schema patch failed; tool declarations left unpatched");
            None
        }
    }
}
