//! Provider selection: builds the configured LLM provider.

use std::sync::Arc;

use domiclaw_config::{AppConfig, ProviderConfig};
use domiclaw_core::error::ProviderError;
use domiclaw_core::provider::Provider;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The vendors DomiClaw can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenRouter,
    OpenAiCompat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::OpenAiCompat => "openai_compat",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "anthropic" => Some(ProviderKind::Anthropic),
            "openrouter" => Some(ProviderKind::OpenRouter),
            "openai_compat" => Some(ProviderKind::OpenAiCompat),
            _ => None,
        }
    }
}

/// Decide which provider to use.
///
/// An explicit `provider` setting wins. Otherwise the first vendor with an
/// API key is chosen, Anthropic first.
pub fn select_kind(config: &AppConfig) -> Result<ProviderKind, ProviderError> {
    if let Some(name) = &config.provider {
        return ProviderKind::parse(name)
            .ok_or_else(|| ProviderError::NotConfigured(format!("unknown provider '{name}'")));
    }

    let providers = &config.providers;
    if providers.anthropic.is_configured() {
        Ok(ProviderKind::Anthropic)
    } else if providers.openrouter.is_configured() {
        Ok(ProviderKind::OpenRouter)
    } else if providers.openai_compat.is_configured() && providers.openai_compat.api_base.is_some() {
        Ok(ProviderKind::OpenAiCompat)
    } else {
        Err(ProviderError::NotConfigured(
            "no API key configured (set ANTHROPIC_API_KEY or OPENROUTER_API_KEY)".into(),
        ))
    }
}

/// Build the provider described by configuration.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let kind = select_kind(config)?;
    let section = match kind {
        ProviderKind::Anthropic => &config.providers.anthropic,
        ProviderKind::OpenRouter => &config.providers.openrouter,
        ProviderKind::OpenAiCompat => &config.providers.openai_compat,
    };
    let api_key = require_key(kind, section)?;

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key)
                .with_max_line_bytes(config.agent.max_sse_line_bytes);
            if let Some(base) = &section.api_base {
                p = p.with_base_url(base);
            }
            Arc::new(p)
        }
        ProviderKind::OpenRouter => {
            let mut p = OpenAiCompatProvider::openrouter(api_key);
            if let Some(base) = &section.api_base {
                p = p.with_base_url(base);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAiCompat => {
            let base = section.api_base.clone().ok_or_else(|| {
                ProviderError::NotConfigured("providers.openai_compat.api_base is required".into())
            })?;
            Arc::new(OpenAiCompatProvider::new("openai_compat", base, api_key))
        }
    };

    tracing::debug!(provider = kind.as_str(), "Provider selected");
    Ok(provider)
}

fn require_key(kind: ProviderKind, section: &ProviderConfig) -> Result<String, ProviderError> {
    match &section.api_key {
        Some(key) if !key.is_empty() => Ok(key.clone()),
        _ => Err(ProviderError::NotConfigured(format!(
            "no API key for provider '{}'",
            kind.as_str()
        ))),
    }
}
