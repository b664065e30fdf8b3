//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, model provider resolution, and loading
//! of the tool catalog and sample requests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use toolmate_llm::{LlmClientConfig, LlmProvider};
use toolmate_planner::ToolCatalog;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LlmSection;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Provider resolution
// ---------------------------------------------------------------------------

/// Resolve which provider, API key and model to use.
///
/// Resolution order:
///
/// 1. `TOOLMATE_PROVIDER`, else `[llm] provider` from the config file.
/// 2. Otherwise, auto-detect from available credentials:
///    `GEMINI_API_KEY`/`GOOGLE_API_KEY` -> `OPENROUTER_API_KEY` ->
///    `OPENAI_API_KEY` -> `ANTHROPIC_API_KEY` -> Ollama (no key).
///
/// The model can be overridden with `TOOLMATE_MODEL`, and an Ollama server
/// located with `OLLAMA_BASE_URL`.
pub fn resolve_llm_config(section: &LlmSection) -> Result<LlmClientConfig> {
    resolve_llm_config_with(section, env_non_empty)
}

/// [`resolve_llm_config`] with an injectable environment lookup.
pub fn resolve_llm_config_with<F>(section: &LlmSection, env: F) -> Result<LlmClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = env("TOOLMATE_PROVIDER").or_else(|| section.provider.clone());
    let model_override = env("TOOLMATE_MODEL").or_else(|| section.model.clone());

    let key_for = |provider: LlmProvider| -> Option<String> {
        match provider {
            LlmProvider::Google => env("GEMINI_API_KEY").or_else(|| env("GOOGLE_API_KEY")),
            LlmProvider::OpenRouter => env("OPENROUTER_API_KEY"),
            LlmProvider::OpenAI => env("OPENAI_API_KEY"),
            LlmProvider::Anthropic => env("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAICompatible => env("TOOLMATE_API_KEY"),
            LlmProvider::Ollama => None,
        }
    };

    let provider = match explicit {
        Some(name) => name
            .parse::<LlmProvider>()
            .with_context(|| format!("unsupported provider `{name}`"))?,
        None => [
            LlmProvider::Google,
            LlmProvider::OpenRouter,
            LlmProvider::OpenAI,
            LlmProvider::Anthropic,
        ]
        .into_iter()
        .find(|p| key_for(*p).is_some())
        .unwrap_or_else(|| {
            info!("no API key found, falling back to a local Ollama model");
            LlmProvider::Ollama
        }),
    };

    let model = model_override.unwrap_or_else(|| provider.default_model().to_owned());

    let mut config = match provider {
        LlmProvider::Ollama => {
            let base_url = env("OLLAMA_BASE_URL").or_else(|| section.base_url.clone());
            LlmClientConfig::ollama(model, base_url)
        }
        LlmProvider::OpenAICompatible => {
            let Some(base_url) = section.base_url.clone() else {
                bail!("provider `openai-compatible` requires `base_url` in the [llm] section");
            };
            let key = key_for(provider).unwrap_or_else(|| "no-key".to_owned());
            LlmClientConfig::openai_compatible(key, model, base_url)
        }
        other => {
            let Some(key) = key_for(other) else {
                bail!(
                    "{other} provider selected but no API key found; set {}",
                    key_env_hint(other)
                );
            };
            let config = match other {
                LlmProvider::Google => LlmClientConfig::google(key, model),
                LlmProvider::OpenRouter => LlmClientConfig::openrouter(key, model),
                LlmProvider::Anthropic => LlmClientConfig::anthropic(key, model),
                _ => LlmClientConfig::openai(key, model),
            };
            match &section.base_url {
                Some(url) => config.with_base_url(url.clone()),
                None => config,
            }
        }
    };

    if let Some(max_tokens) = section.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = section.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(secs) = section.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

/// Environment variable(s) holding the key for `provider`.
pub fn key_env_hint(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Google => "GEMINI_API_KEY or GOOGLE_API_KEY",
        LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        LlmProvider::OpenAI => "OPENAI_API_KEY",
        LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        LlmProvider::OpenAICompatible => "TOOLMATE_API_KEY",
        LlmProvider::Ollama => "OLLAMA_BASE_URL (optional)",
    }
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Data files
// ---------------------------------------------------------------------------

/// Load the tool catalog, with the path in the error message.
pub fn load_catalog(path: &Path) -> Result<Arc<ToolCatalog>> {
    let catalog = ToolCatalog::load(path)
        .with_context(|| format!("failed to load tool catalog from {}", path.display()))?;
    Ok(Arc::new(catalog))
}

/// Non-empty, non-comment lines of the sample requests file.
///
/// A missing file yields no samples.
pub fn load_samples(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_samples(&content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no sample requests loaded");
            Vec::new()
        }
    }
}

fn parse_samples(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
