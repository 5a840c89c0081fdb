//! Provider adapters.
//!
//! Every provider is an HTTP backend configured under `[providers.<name>]`.
//! Providers without an endpoint, or with `enabled = false`, get no adapter and
//! are reported as not configured when requested.

pub mod backend;

pub use backend::HttpProviderAdapter;

use std::sync::Arc;

use reqwest::Client;

use crate::core::adapter::AdapterSet;
use crate::core::provider::Provider;
use crate::storage::config::Config;

/// Build adapters for every enabled provider that has an endpoint.
#[must_use]
pub fn build_adapters(config: &Config, client: &Client) -> AdapterSet {
    let mut adapters = AdapterSet::new();

    for provider in Provider::ALL {
        let settings = config.providers.settings(*provider);
        if !settings.enabled {
            tracing::debug!(provider = %provider, "Provider disabled in config");
            continue;
        }
        let Some(endpoint) = settings.endpoint.as_deref() else {
            tracing::debug!(provider = %provider, "No endpoint configured");
            continue;
        };

        let key_env = settings
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| provider.default_api_key_env());
        let api_key = std::env::var(key_env).ok();
        if api_key.is_none() {
            tracing::debug!(provider = %provider, env = key_env, "No API key in environment");
        }

        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        adapters.insert(Arc::new(
            HttpProviderAdapter::new(*provider, client.clone(), endpoint)
                .with_model(model)
                .with_api_key(api_key),
        ));
    }

    adapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_enabled_providers_with_endpoints_get_adapters() {
        let mut config = Config::default();
        config.providers.openai.endpoint = Some("http://localhost:1/analyze".to_string());
        config.providers.anthropic.endpoint = Some("http://localhost:2/analyze".to_string());
        config.providers.anthropic.enabled = false;
        config.providers.deepseek.model = Some("deepseek-reasoner".to_string());

        let adapters = build_adapters(&config, &Client::new());
        assert_eq!(adapters.providers(), vec![Provider::OpenAi]);
    }

    #[test]
    fn empty_config_builds_no_adapters() {
        assert!(build_adapters(&Config::default(), &Client::new()).is_empty());
    }
}
