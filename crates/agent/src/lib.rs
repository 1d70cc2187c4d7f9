//! The Courier messaging agent.
//!
//! - [`definition`] holds the WhatsApp messaging preset: name, model, and
//!   the instruction text that drives the dialogue.
//! - [`bootstrap`] starts the tool provider and assembles the definition.
//! - [`loop_runner`] hosts a definition against a chat model, executing the
//!   tool calls the model asks for until it answers in text.

pub mod bootstrap;
pub mod definition;
pub mod loop_runner;

pub use bootstrap::{Bootstrap, assemble_definition, bootstrap};
pub use definition::{
    AGENT_NAME, DEFAULT_MODEL, DISCLAIMER, MESSAGING_INSTRUCTION, SEND_TOOL, messaging_agent,
    with_disclaimer,
};
pub use loop_runner::AgentLoop;
