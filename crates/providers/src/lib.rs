//! Chat model providers for Courier.
//!
//! Gemini is reached through its OpenAI-compatible endpoint, so a single
//! OpenAI-style client covers it along with OpenRouter, OpenAI, and local
//! OpenAI-compatible servers.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
