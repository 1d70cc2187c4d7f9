//! Provider router: builds the configured providers and picks the default.

use std::collections::HashMap;
use std::sync::Arc;

use courier_config::AppConfig;
use courier_core::provider::Provider;
use tracing::warn;

use crate::openai_compat::{GEMINI_BASE_URL, OpenAiCompatProvider};

/// Routes model requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` table becomes an OpenAI-compatible client, and
/// the default provider is added even when not listed. A provider with no
/// `api_url` and no well-known endpoint is skipped.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let Some(base_url) = provider_config
            .api_url
            .clone()
            .or_else(|| default_base_url(name))
        else {
            warn!(provider = %name, "No api_url configured and no known endpoint; provider skipped");
            continue;
        };

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)),
        );
    }

    if router.get(&config.default_provider).is_none() {
        match default_base_url(&config.default_provider) {
            Some(base_url) => {
                let api_key = config.api_key.clone().unwrap_or_default();
                router.register(
                    config.default_provider.clone(),
                    Arc::new(OpenAiCompatProvider::new(
                        &config.default_provider,
                        base_url,
                        api_key,
                    )),
                );
            }
            None => warn!(
                provider = %config.default_provider,
                "Default provider has no known endpoint; add [providers.{}] with an api_url",
                config.default_provider
            ),
        }
    }

    router
}

/// Default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "gemini" | "google" => GEMINI_BASE_URL,
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        _ => return None,
    };
    Some(url.to_string())
}
