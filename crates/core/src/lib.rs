//! # Courier Core
//!
//! Domain types, traits, and error definitions for the Courier messaging agent.
//! This crate has **no framework dependencies**: it defines the model that the
//! provider, tool, and agent crates implement against.
//!
//! ## Layout
//!
//! - [`provider`] and [`tool`] are the two seams: a chat model behind
//!   [`Provider`], remote procedures behind [`Tool`].
//! - [`schema`] is the typed view of a tool's parameter schema, used where a
//!   schema has to be inspected or adjusted rather than passed through.
//! - [`agent`] holds the immutable [`AgentDefinition`] the host runs.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentDefinition;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use schema::{FunctionDeclaration, Schema, SchemaType};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
